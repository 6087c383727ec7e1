use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    error::{PendantError, PendantResult},
    vm::{EvaluationContext, Operand, SubExpression, TokenSequence, point::COMPONENT_NAMES},
};

use super::{
    Program,
    library::ProgramHandle,
    motion::{MotionInstruction, MotionRequest},
};

/// Tool and user frames selectable on a device.
pub const FRAME_COUNT: usize = 10;

/// Identity of an instruction inside its program, stable across list edits.
/// Zero means not yet assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InstructionId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    #[serde(rename = "0")]
    Tool,
    #[serde(rename = "1")]
    User,
}

/// A register written by an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterTarget {
    #[serde(rename = "0")]
    Data(usize),
    #[serde(rename = "1")]
    Io(usize),
    #[serde(rename = "2")]
    Position(usize),
    #[serde(rename = "3")]
    PositionComponent(usize, usize),
}

impl Display for RegisterTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterTarget::Data(i) => write!(f, "R[{}]", i + 1),
            RegisterTarget::Io(i) => write!(f, "IO[{}]", i + 1),
            RegisterTarget::Position(i) => write!(f, "PR[{}]", i + 1),
            RegisterTarget::PositionComponent(i, c) => {
                let name = COMPONENT_NAMES.get(*c).copied().unwrap_or("?");
                write!(f, "PR[{},{}]", i + 1, name)
            }
        }
    }
}

/// Target of a `CALL`. Persisted by name and device; `link` is filled by the
/// linking pass once every program is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTarget {
    pub program: String,
    pub device: u8,
    #[serde(skip)]
    pub link: Option<ProgramHandle>,
}

impl CallTarget {
    pub fn new(program: impl Into<String>, device: u8) -> Self {
        CallTarget {
            program: program.into(),
            device,
            link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectCase {
    pub value: Operand,
    pub body: Instruction,
}

/// Saved under the number returned by [`Instruction::tag`], so variants can be
/// renamed without breaking saved cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum InstructionKind {
    #[default]
    #[serde(rename = "0")]
    Blank,
    #[serde(rename = "1")]
    Motion(MotionInstruction),
    #[serde(rename = "2")]
    FrameSelect {
        kind: FrameKind,
        index: usize,
    },
    #[serde(rename = "3")]
    IoSet {
        register: usize,
        state: bool,
    },
    #[serde(rename = "4")]
    Label(u32),
    #[serde(rename = "5")]
    Jump(u32),
    #[serde(rename = "6")]
    Call(CallTarget),
    #[serde(rename = "7")]
    RegisterAssign {
        target: RegisterTarget,
        expression: TokenSequence,
    },
    #[serde(rename = "8")]
    If {
        condition: SubExpression,
        body: Box<Instruction>,
    },
    #[serde(rename = "9")]
    Select {
        argument: Operand,
        cases: Vec<SelectCase>,
    },
}

/// How execution continues after an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Next,
    Jump(u32),
    Call(CallTarget),
    Motion(MotionRequest),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// Kept in the program text, skipped by execution.
    pub commented: bool,
    #[serde(skip)]
    pub(crate) id: InstructionId,
}

impl From<InstructionKind> for Instruction {
    fn from(kind: InstructionKind) -> Self {
        Instruction::new(kind)
    }
}

impl Instruction {
    pub fn new(kind: InstructionKind) -> Self {
        Instruction {
            kind,
            commented: false,
            id: InstructionId::default(),
        }
    }

    pub fn motion(motion: MotionInstruction) -> Self {
        Self::new(InstructionKind::Motion(motion))
    }

    pub fn label(number: u32) -> Self {
        Self::new(InstructionKind::Label(number))
    }

    pub fn jump(label: u32) -> Self {
        Self::new(InstructionKind::Jump(label))
    }

    pub fn call(program: impl Into<String>, device: u8) -> Self {
        Self::new(InstructionKind::Call(CallTarget::new(program, device)))
    }

    pub fn io_set(register: usize, state: bool) -> Self {
        Self::new(InstructionKind::IoSet { register, state })
    }

    pub fn assign(target: RegisterTarget, expression: TokenSequence) -> Self {
        Self::new(InstructionKind::RegisterAssign { target, expression })
    }

    pub fn if_then(condition: impl Into<Operand>, body: Instruction) -> Self {
        let condition = match condition.into() {
            Operand::SubExpression(sub) => *sub,
            other => SubExpression::Sequence(TokenSequence::from_tokens(vec![other.into()])),
        };
        Self::new(InstructionKind::If {
            condition,
            body: Box::new(body),
        })
    }

    pub fn select(argument: Operand, cases: Vec<(Operand, Instruction)>) -> Self {
        let cases = cases
            .into_iter()
            .map(|(value, body)| SelectCase { value, body })
            .collect();
        Self::new(InstructionKind::Select { argument, cases })
    }

    pub fn commented(mut self) -> Self {
        self.commented = true;
        self
    }

    #[inline]
    pub fn id(&self) -> InstructionId {
        self.id
    }

    /// Stable persistence tag of the variant.
    pub fn tag(&self) -> u8 {
        match &self.kind {
            InstructionKind::Blank => 0,
            InstructionKind::Motion(_) => 1,
            InstructionKind::FrameSelect { .. } => 2,
            InstructionKind::IoSet { .. } => 3,
            InstructionKind::Label(_) => 4,
            InstructionKind::Jump(_) => 5,
            InstructionKind::Call(_) => 6,
            InstructionKind::RegisterAssign { .. } => 7,
            InstructionKind::If { .. } => 8,
            InstructionKind::Select { .. } => 9,
        }
    }

    pub fn is_motion(&self) -> bool {
        matches!(self.kind, InstructionKind::Motion(_))
    }

    fn is_transfer(&self) -> bool {
        matches!(self.kind, InstructionKind::Jump(_) | InstructionKind::Call(_))
    }

    /// Runs the instruction against the context. Errors leave every register
    /// untouched.
    pub fn execute(&self, ctx: &mut EvaluationContext, program: &Program) -> PendantResult<Flow> {
        if self.commented {
            return Ok(Flow::Next);
        }
        match &self.kind {
            InstructionKind::Blank | InstructionKind::Label(_) => Ok(Flow::Next),
            InstructionKind::Motion(motion) => Ok(Flow::Motion(motion.request(ctx, program)?)),
            InstructionKind::FrameSelect { kind, index } => {
                if *index >= FRAME_COUNT {
                    return Err(PendantError::out_of_range("frame", *index, FRAME_COUNT));
                }
                match kind {
                    FrameKind::Tool => ctx.frames.tool = *index,
                    FrameKind::User => ctx.frames.user = *index,
                }
                Ok(Flow::Next)
            }
            InstructionKind::IoSet { register, state } => {
                ctx.registers.set_io(*register, *state)?;
                Ok(Flow::Next)
            }
            InstructionKind::Jump(label) => Ok(Flow::Jump(*label)),
            InstructionKind::Call(target) => Ok(Flow::Call(target.clone())),
            InstructionKind::RegisterAssign { target, expression } => {
                let value = expression.evaluate(ctx)?;
                store(ctx, *target, value)?;
                Ok(Flow::Next)
            }
            InstructionKind::If { condition, body } => match condition.evaluate(ctx)? {
                Operand::Bool(true) => body.execute(ctx, program),
                Operand::Bool(false) => Ok(Flow::Next),
                other => Err(PendantError::mismatch(format!(
                    "IF condition gave {other}, expected ON/OFF"
                ))),
            },
            InstructionKind::Select { argument, cases } => {
                let hit = cases.iter().find(|case| case.value.same_value(argument, ctx));
                match hit {
                    Some(case) if case.body.is_transfer() => case.body.execute(ctx, program),
                    _ => Ok(Flow::Next),
                }
            }
        }
    }

    /// Visits every call target, including those nested in `IF` and
    /// `SELECT` bodies.
    pub fn for_each_call_mut(&mut self, f: &mut impl FnMut(&mut CallTarget)) {
        match &mut self.kind {
            InstructionKind::Call(target) => f(target),
            InstructionKind::If { body, .. } => body.for_each_call_mut(f),
            InstructionKind::Select { cases, .. } => {
                for case in cases {
                    case.body.for_each_call_mut(f);
                }
            }
            _ => (),
        }
    }
}

/// Writes an evaluated value into a register. The value's own capability
/// picks which destinations are legal.
fn store(ctx: &mut EvaluationContext, target: RegisterTarget, value: Operand) -> PendantResult<()> {
    match (value, target) {
        (Operand::Float(x), RegisterTarget::Data(i)) => ctx.registers.set_data(i, x),
        (Operand::Float(x), RegisterTarget::PositionComponent(i, c)) => {
            ctx.registers.set_position_component(i, c, x)
        }
        (Operand::Bool(b), RegisterTarget::Io(i)) => ctx.registers.set_io(i, b),
        (Operand::Point(p), RegisterTarget::Position(i)) => ctx.registers.set_position(i, p),
        (value, target) => Err(PendantError::mismatch(format!(
            "cannot store {value} into {target}"
        ))),
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.commented {
            write!(f, "//")?;
        }
        match &self.kind {
            InstructionKind::Blank => Ok(()),
            InstructionKind::Motion(motion) => write!(f, "{motion}"),
            InstructionKind::FrameSelect { kind, index } => match kind {
                FrameKind::Tool => write!(f, "UTOOL_NUM={index}"),
                FrameKind::User => write!(f, "UFRAME_NUM={index}"),
            },
            InstructionKind::IoSet { register, state } => {
                write!(f, "IO[{}]={}", register + 1, if *state { "ON" } else { "OFF" })
            }
            InstructionKind::Label(n) => write!(f, "LBL[{n}]"),
            InstructionKind::Jump(n) => write!(f, "JMP LBL[{n}]"),
            InstructionKind::Call(target) => {
                write!(f, "CALL {} (R{})", target.program, target.device)
            }
            InstructionKind::RegisterAssign { target, expression } => {
                write!(f, "{target}={expression}")
            }
            InstructionKind::If { condition, body } => write!(f, "IF {condition},{body}"),
            InstructionKind::Select { argument, cases } => {
                write!(f, "SELECT {argument}")?;
                for case in cases {
                    write!(f, " ={},{}", case.value, case.body)?;
                }
                Ok(())
            }
        }
    }
}
