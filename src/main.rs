use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use pendant_core::{
    config::{Config, ConfigLoader},
    engine::{
        Cell, Device, DoneReason, InstantMotion, MotionService, RunMode, SimulatedMotion, Status,
    },
    log_debug, log_error, log_println, log_warn,
    logger::{self, get_logger},
    persistence::CellSnapshot,
    program::{
        Instruction, Program, ProgramLibrary,
        instruction::RegisterTarget,
        motion::{MotionInstruction, MotionType, PositionRef},
    },
    vm::{Operand, Operator, Point, RegisterBank, RobotPose, Token, TokenSequence},
};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Pendant: a two-arm teach pendant simulator.",
    long_about = "Runs, inspects and exports saved work cells. A cell holds the programs\n\
    of both arms and the registers they share."
)]
struct Cli {
    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory for the rotating log file; also enables file logging
    #[arg(long, value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a small demo cell
    Demo {
        #[arg(value_name = "CELL")]
        output: PathBuf,
    },
    /// Run a program of a saved cell until both arms are idle
    Run {
        #[arg(value_name = "CELL")]
        cell: PathBuf,

        #[arg(short, long, default_value = "MAIN")]
        program: String,

        #[arg(short, long, default_value_t = 0)]
        device: u8,

        /// Line to start from, counted from 1
        #[arg(short, long, default_value_t = 1)]
        line: usize,

        /// Overrides the configured run mode
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Complete moves at once instead of interpolating them
        #[arg(long)]
        instant: bool,

        /// Write registers back to the cell file after the run
        #[arg(long)]
        save: bool,
    },
    /// Print the programs and positions of a saved cell
    Inspect {
        #[arg(value_name = "CELL")]
        cell: PathBuf,
    },
    /// Convert a saved cell to pretty JSON
    ExportJson {
        #[arg(value_name = "CELL")]
        cell: PathBuf,

        /// Output file, stdout when omitted
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Full,
    Step,
    Backward,
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Full => RunMode::Full,
            Mode::Step => RunMode::SingleStep,
            Mode::Backward => RunMode::Backward,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init_standalone();
    let loader = match &cli.config {
        Some(path) => ConfigLoader::at(path),
        None => ConfigLoader::new()?,
    };
    let config = loader
        .load_or_create()
        .with_context(|| format!("Failed to load {}", loader.config_path().display()))?;
    config.apply_logging(get_logger());
    if let Some(dir) = cli.log_dir {
        get_logger().set_log_directory(dir);
        get_logger().set_mode(logger::LoggerMode::Full);
    }
    if let Some(path) = get_logger().log_file_path() {
        log_debug!("Logging to {}", path.display());
    }

    match cli.command {
        Command::Demo { output } => {
            demo_cell(&config)?.save(&output)?;
            log_println!("Demo cell written to {}", output.display());
        }
        Command::Run {
            cell,
            program,
            device,
            line,
            mode,
            instant,
            save,
        } => {
            let mode = mode.map(RunMode::from).unwrap_or(config.execution.default_mode);
            let snapshot = CellSnapshot::load(&cell)?;
            let mut live = snapshot.into_cell(|id| motion_for(&config, id, instant))?;
            run(&mut live, &config, device, &program, mode, line)?;
            report(&live);
            if save {
                CellSnapshot::capture(&live).save(&cell)?;
                log_println!("Registers saved to {}", cell.display());
            }
        }
        Command::Inspect { cell } => inspect(&CellSnapshot::load(&cell)?),
        Command::ExportJson { cell, output } => {
            let json = CellSnapshot::load(&cell)?.to_json()?;
            match output {
                Some(path) => write_file(&path, &json)?,
                None => println!("{json}"),
            }
        }
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn motion_for(config: &Config, device: u8, instant: bool) -> Box<dyn MotionService> {
    if instant || !config.motion.simulate {
        return Box::new(InstantMotion::default());
    }
    match SimulatedMotion::create(device, RobotPose::default(), config.simulation_timing()) {
        Ok(motion) => Box::new(motion),
        Err(e) => {
            log_warn!("Motion thread for R{device} failed to start: {e}. Moves complete at once.");
            Box::new(InstantMotion::default())
        }
    }
}

fn run(
    cell: &mut Cell,
    config: &Config,
    device: u8,
    program: &str,
    mode: RunMode,
    line: usize,
) -> Result<()> {
    if line == 0 {
        bail!("lines are counted from 1");
    }
    cell.start(device, program, mode, line - 1)?;
    loop {
        cell.run_until_idle(config.execution.max_ticks);
        // A step inside a cross-device call pauses the callee, not the arm we started.
        let Some((id, text)) = cell.devices().iter().find_map(paused_line) else {
            return Ok(());
        };
        log_println!("{text}");
        cell.device_mut(id)?.resume()?;
    }
}

fn paused_line(arm: &Device) -> Option<(u8, String)> {
    let state = arm.execution()?;
    if state.status() != &Status::Done(DoneReason::Stepped) {
        return None;
    }
    let text = arm
        .library()
        .get(state.program().index)
        .and_then(|p| p.instruction(state.current()))
        .map(ToString::to_string)
        .unwrap_or_default();
    Some((
        arm.id(),
        format!("R{} paused on line {}: {text}", arm.id(), state.current() + 1),
    ))
}

fn report(cell: &Cell) {
    for device in cell.devices() {
        match device.status() {
            Some(Status::Fault(reason)) => log_error!("R{} fault: {reason}", device.id()),
            Some(status) => log_println!("R{} {status}", device.id()),
            None => log_println!("R{} idle", device.id()),
        }
        log_println!("R{} tool tip {}", device.id(), device.pose().tool_tip);
    }
    let registers = cell.registers();
    for index in 0..registers.data_len() {
        if let Ok(value) = registers.data(index) {
            if value != 0.0 {
                log_println!("R[{}] = {value}", index + 1);
            }
        }
    }
}

fn inspect(snapshot: &CellSnapshot) {
    for (id, library) in snapshot.devices.iter().enumerate() {
        for program in library.programs() {
            log_println!(
                "R{id} {} ({} lines, {} positions)",
                program.name(),
                program.len(),
                program.position_count()
            );
            for (line, instruction) in program.instructions().iter().enumerate() {
                log_println!("{:>4}: {instruction};", line + 1);
            }
            for (slot, point) in program.positions() {
                log_println!("  P[{}] {point}", slot + 1);
            }
        }
    }
}

fn joint(slot: usize, speed: f32) -> MotionInstruction {
    MotionInstruction::new(MotionType::Joint, PositionRef::Local(slot), speed)
}

/// Device 0 loops three times over a pick move and hands each part to device 1.
fn demo_cell(config: &Config) -> Result<CellSnapshot> {
    let mut main = Program::new("MAIN");
    main.teach_position(Point::new([400.0, 0.0, 300.0], [180.0, 0.0, 0.0]))?;
    main.teach_position(Point::new([400.0, 0.0, 120.0], [180.0, 0.0, 0.0]))?;
    let count = RegisterTarget::Data(0);
    for instruction in [
        Instruction::motion(joint(0, 100.0)),
        Instruction::label(1),
        Instruction::motion(
            MotionInstruction::new(MotionType::Linear, PositionRef::Local(1), 500.0)
                .with_termination(50),
        ),
        Instruction::assign(
            count,
            TokenSequence::from_tokens(vec![
                Token::Operand(Operand::DataRegister(0)),
                Token::Operator(Operator::Add),
                Token::Operand(Operand::Float(1.0)),
            ]),
        ),
        Instruction::call("GRIP", 1),
        Instruction::if_then(
            TokenSequence::from_tokens(vec![
                Token::Operand(Operand::DataRegister(0)),
                Token::Operator(Operator::Lt),
                Token::Operand(Operand::Float(3.0)),
            ]),
            Instruction::jump(1),
        ),
        Instruction::motion(joint(0, 50.0)),
    ] {
        main.push_instruction(instruction)?;
    }

    let mut grip = Program::new("GRIP");
    grip.teach_position(Point::new([0.0, 400.0, 200.0], [180.0, 0.0, 90.0]))?;
    for instruction in [
        Instruction::io_set(0, true),
        Instruction::motion(joint(0, 100.0)),
        Instruction::io_set(0, false),
    ] {
        grip.push_instruction(instruction)?;
    }

    let mut left = ProgramLibrary::new();
    left.add(main)?;
    let mut right = ProgramLibrary::new();
    right.add(grip)?;
    let registers: RegisterBank = config.register_bank();
    Ok(CellSnapshot::new(registers, vec![left, right]))
}
