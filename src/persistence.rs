//! Saved cells: programs of both devices plus the shared registers.
//!
//! Files are MessagePack with named fields, compressed with Zstd. Calls are
//! stored by program name and device, and linked again after loading.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    engine::{Cell, DEVICE_COUNT, MotionService},
    error::{PendantError, PendantResult},
    log_warn,
    program::{ProgramLibrary, link_calls},
    vm::RegisterBank,
};

/// Bumped whenever a saved cell stops loading with the previous layout.
pub const FORMAT_VERSION: u32 = 1;

const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub format_version: u32,
    pub registers: RegisterBank,
    /// One library per device, in device order.
    pub devices: Vec<ProgramLibrary>,
}

impl CellSnapshot {
    pub fn new(registers: RegisterBank, devices: Vec<ProgramLibrary>) -> Self {
        CellSnapshot {
            format_version: FORMAT_VERSION,
            registers,
            devices,
        }
    }

    pub fn capture(cell: &Cell) -> Self {
        let devices = cell.devices().iter().map(|d| d.library().clone()).collect();
        Self::new(cell.registers().clone(), devices)
    }

    pub fn to_bytes(&self) -> PendantResult<Vec<u8>> {
        let msgpack_bytes = rmp_serde::to_vec_named(self).map_err(PendantError::persistence)?;
        zstd::encode_all(msgpack_bytes.as_slice(), COMPRESSION_LEVEL)
            .map_err(PendantError::persistence)
    }

    /// Decodes a saved cell, gives every instruction a fresh identity and
    /// links calls. Unresolved calls are logged and left unlinked.
    pub fn from_bytes(bytes: &[u8]) -> PendantResult<Self> {
        let msgpack_bytes = zstd::decode_all(bytes).map_err(PendantError::persistence)?;
        let snapshot: CellSnapshot =
            rmp_serde::from_slice(&msgpack_bytes).map_err(PendantError::persistence)?;
        snapshot.finish_load()
    }

    fn finish_load(mut self) -> PendantResult<Self> {
        if self.format_version != FORMAT_VERSION {
            return Err(PendantError::persistence(format!(
                "format version {} is not supported (expected {FORMAT_VERSION})",
                self.format_version
            )));
        }
        for library in self.devices.iter_mut() {
            for index in 0..library.len() {
                if let Some(program) = library.get_mut(index) {
                    program.renumber();
                }
            }
        }
        for error in self.link() {
            log_warn!("{error}");
        }
        Ok(self)
    }

    /// Links every call across the saved libraries.
    pub fn link(&mut self) -> Vec<PendantError> {
        let mut libraries: Vec<&mut ProgramLibrary> = self.devices.iter_mut().collect();
        link_calls(&mut libraries)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> PendantResult<()> {
        fs::write(path, self.to_bytes()?).map_err(PendantError::persistence)
    }

    pub fn load(path: impl AsRef<Path>) -> PendantResult<Self> {
        let bytes = fs::read(path).map_err(PendantError::persistence)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_json(&self) -> PendantResult<String> {
        serde_json::to_string_pretty(self).map_err(PendantError::persistence)
    }

    /// Reads an exported cell back, with the same checks as [`Self::from_bytes`].
    pub fn from_json(json: &str) -> PendantResult<Self> {
        let snapshot: CellSnapshot =
            serde_json::from_str(json).map_err(PendantError::persistence)?;
        snapshot.finish_load()
    }

    /// Builds a live cell. Missing devices get an empty library.
    pub fn into_cell(
        self,
        motion: impl FnMut(u8) -> Box<dyn MotionService>,
    ) -> PendantResult<Cell> {
        if self.devices.len() > DEVICE_COUNT {
            return Err(PendantError::persistence(format!(
                "{} devices saved, a cell has {DEVICE_COUNT}",
                self.devices.len()
            )));
        }
        let mut devices = self.devices.into_iter();
        let libraries: [ProgramLibrary; DEVICE_COUNT] =
            std::array::from_fn(|_| devices.next().unwrap_or_default());
        Ok(Cell::new(self.registers, libraries, motion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{InstantMotion, RunMode},
        program::{
            Instruction, InstructionKind, Program,
            instruction::RegisterTarget,
        },
        vm::{Operand, Operator, Point, Token, TokenSequence},
    };

    fn sample() -> CellSnapshot {
        let mut registers = RegisterBank::default();
        registers.set_data(3, 1.5).unwrap();
        registers.set_data_comment(3, "count").unwrap();
        registers.set_io(2, true).unwrap();

        let mut main = Program::new("MAIN");
        main.teach_position(Point::new([1.0, 2.0, 3.0], [4.0, 5.0, 6.0]))
            .unwrap();
        main.push_instruction(Instruction::call("GRIP", 1)).unwrap();
        main.push_instruction(Instruction::assign(
            RegisterTarget::Data(3),
            TokenSequence::from_tokens(vec![
                Token::Operand(Operand::DataRegister(3)),
                Token::Operator(Operator::Mul),
                Token::Operand(
                    TokenSequence::from_tokens(vec![
                        Token::Operand(Operand::Float(2.0)),
                        Token::Operator(Operator::Add),
                        Token::Operand(Operand::Float(1.0)),
                    ])
                    .into(),
                ),
            ]),
        ))
        .unwrap();
        main.push_instruction(Instruction::label(1).commented()).unwrap();
        let mut left = ProgramLibrary::new();
        left.add(main).unwrap();
        let mut right = ProgramLibrary::new();
        right.create("GRIP").unwrap();
        CellSnapshot::new(registers, vec![left, right])
    }

    fn call_link(snapshot: &CellSnapshot) -> bool {
        let Some(main) = snapshot.devices[0].by_name("MAIN") else {
            return false;
        };
        matches!(
            &main.instructions()[0].kind,
            InstructionKind::Call(target) if target.link.is_some()
        )
    }

    #[test]
    fn saved_cells_load_back_linked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.pendant");
        let original = sample();
        original.save(&path).unwrap();

        let loaded = CellSnapshot::load(&path).unwrap();
        assert_eq!(loaded.registers, original.registers);
        let mut expected = sample();
        expected.link();
        assert_eq!(loaded.devices, expected.devices);
        assert!(call_link(&loaded));
        assert!(!call_link(&original));

        let main = loaded.devices[0].by_name("MAIN").unwrap();
        let saved_main = original.devices[0].by_name("MAIN").unwrap();
        assert_eq!(main.position(0), saved_main.position(0));
        assert!(main.instructions()[2].commented);
        let ids: Vec<_> = main.instructions().iter().map(Instruction::id).collect();
        assert_eq!(main.position_of(ids[1]), Some(1));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut snapshot = sample();
        snapshot.format_version = FORMAT_VERSION + 1;
        let bytes = snapshot.to_bytes().unwrap();
        assert!(matches!(
            CellSnapshot::from_bytes(&bytes),
            Err(PendantError::Persistence(_))
        ));
        assert!(CellSnapshot::from_bytes(b"not a cell").is_err());
        assert!(CellSnapshot::load("/nonexistent/cell.pendant").is_err());
    }

    #[test]
    fn exports_use_numeric_tags() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let main = &value["devices"][0]["programs"][0]["instructions"];
        assert_eq!(main[0]["kind"]["6"]["program"], "GRIP");
        assert_eq!(main[0]["kind"]["6"]["device"], 1);
        assert_eq!(main[2]["kind"]["4"], 1);
        let assign = &main[1]["kind"]["7"];
        assert_eq!(assign["target"]["0"], 3);
        let tokens = &assign["expression"]["tokens"];
        assert_eq!(tokens[0]["0"]["3"], 3);
        assert_eq!(tokens[1]["1"], 2);
        assert_eq!(tokens[2]["0"]["10"]["tokens"][1]["1"], 0);
        assert!(!json.contains("RegisterAssign"));
        assert!(!json.contains("Operator"));

        let back = CellSnapshot::from_json(&json).unwrap();
        assert!(call_link(&back));
        let mut expected = sample();
        expected.link();
        assert_eq!(back.devices, expected.devices);
    }

    #[test]
    fn json_imports_are_checked_like_saved_files() {
        let mut snapshot = sample();
        snapshot.devices.truncate(1);
        let json = snapshot.to_json().unwrap();
        let back = CellSnapshot::from_json(&json).unwrap();
        assert!(!call_link(&back));
        let main = back.devices[0].by_name("MAIN").unwrap();
        let ids: Vec<_> = main.instructions().iter().map(Instruction::id).collect();
        assert_eq!(main.position_of(ids[2]), Some(2));

        snapshot.format_version = FORMAT_VERSION + 1;
        let json = snapshot.to_json().unwrap();
        assert!(matches!(
            CellSnapshot::from_json(&json),
            Err(PendantError::Persistence(_))
        ));
    }

    #[test]
    fn loaded_cell_runs() {
        let mut cell = sample()
            .into_cell(|_| Box::new(InstantMotion::default()) as Box<dyn MotionService>)
            .unwrap();
        cell.start(0, "MAIN", RunMode::Full, 0).unwrap();
        cell.run_until_idle(50);
        // 1.5 * (2 + 1)
        assert_eq!(cell.registers().data(3), Ok(4.5));

        let snapshot = CellSnapshot::capture(&cell);
        assert_eq!(snapshot.devices.len(), DEVICE_COUNT);
        assert_eq!(snapshot.registers.data(3), Ok(4.5));

        let too_many = CellSnapshot::new(RegisterBank::default(), vec![ProgramLibrary::new(); 3]);
        let motion = |_| Box::new(InstantMotion::default()) as Box<dyn MotionService>;
        assert!(too_many.into_cell(motion).is_err());
    }
}
