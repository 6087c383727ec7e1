use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{PendantError, PendantResult};

use super::{
    EvaluationContext,
    expression::ExpressionTree,
    point::{COMPONENT_NAMES, Point},
    token_sequence::TokenSequence,
};

/// One of the three ways an operand can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Arith,
    Point,
    Bool,
}

impl Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::Arith => "arithmetic",
            Capability::Point => "point",
            Capability::Bool => "boolean",
        };
        write!(f, "{name}")
    }
}

/// A nested expression inside an operand slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubExpression {
    #[serde(rename = "9")]
    Tree(ExpressionTree),
    #[serde(rename = "10")]
    Sequence(TokenSequence),
}

impl SubExpression {
    pub fn evaluate(&self, ctx: &EvaluationContext) -> PendantResult<Operand> {
        match self {
            SubExpression::Tree(tree) => tree.evaluate(ctx),
            SubExpression::Sequence(seq) => seq.evaluate(ctx),
        }
    }
}

impl Display for SubExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubExpression::Tree(tree) => write!(f, "{tree}"),
            SubExpression::Sequence(seq) => write!(f, "({seq})"),
        }
    }
}

/// A typed operand of a pendant expression.
///
/// Register variants hold an index into the shared `RegisterBank`, so cloning
/// an operand copies the reference and never the register contents. Saved
/// under its [`Operand::tag`] rather than the variant name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Operand {
    #[default]
    #[serde(rename = "0")]
    Uninitialized,
    #[serde(rename = "1")]
    Float(f32),
    #[serde(rename = "2")]
    Bool(bool),
    #[serde(rename = "3")]
    DataRegister(usize),
    #[serde(rename = "4")]
    IoRegister(usize),
    #[serde(rename = "5")]
    PositionRegister(usize),
    /// Position register index and component (0..5 for X, Y, Z, W, P, R).
    #[serde(rename = "6")]
    PositionComponent(usize, usize),
    #[serde(rename = "7")]
    Point(Point),
    /// The live tool tip, in cartesian or joint representation.
    #[serde(rename = "8")]
    RobotPose {
        cartesian: bool,
    },
    #[serde(untagged)]
    SubExpression(Box<SubExpression>),
}

impl From<f32> for Operand {
    fn from(value: f32) -> Self {
        Operand::Float(value)
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Operand::Bool(value)
    }
}

impl From<Point> for Operand {
    fn from(value: Point) -> Self {
        Operand::Point(value)
    }
}

impl From<TokenSequence> for Operand {
    fn from(value: TokenSequence) -> Self {
        Operand::SubExpression(Box::new(SubExpression::Sequence(value)))
    }
}

impl From<ExpressionTree> for Operand {
    fn from(value: ExpressionTree) -> Self {
        Operand::SubExpression(Box::new(SubExpression::Tree(value)))
    }
}

impl Operand {
    /// Stable persistence tag of the variant.
    pub fn tag(&self) -> u8 {
        match self {
            Operand::Uninitialized => 0,
            Operand::Float(_) => 1,
            Operand::Bool(_) => 2,
            Operand::DataRegister(_) => 3,
            Operand::IoRegister(_) => 4,
            Operand::PositionRegister(_) => 5,
            Operand::PositionComponent(_, _) => 6,
            Operand::Point(_) => 7,
            Operand::RobotPose { .. } => 8,
            Operand::SubExpression(sub) => match **sub {
                SubExpression::Tree(_) => 9,
                SubExpression::Sequence(_) => 10,
            },
        }
    }

    /// The capability implied by the variant itself. Sub-expressions have
    /// none until they are evaluated.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Operand::Float(_) | Operand::DataRegister(_) | Operand::PositionComponent(_, _) => {
                Some(Capability::Arith)
            }
            Operand::Bool(_) | Operand::IoRegister(_) => Some(Capability::Bool),
            Operand::Point(_) | Operand::PositionRegister(_) | Operand::RobotPose { .. } => {
                Some(Capability::Point)
            }
            Operand::Uninitialized | Operand::SubExpression(_) => None,
        }
    }

    #[inline]
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Operand::Uninitialized)
    }

    pub fn as_sequence(&self) -> Option<&TokenSequence> {
        match self {
            Operand::SubExpression(sub) => match &**sub {
                SubExpression::Sequence(seq) => Some(seq),
                SubExpression::Tree(_) => None,
            },
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut TokenSequence> {
        match self {
            Operand::SubExpression(sub) => match &mut **sub {
                SubExpression::Sequence(seq) => Some(seq),
                SubExpression::Tree(_) => None,
            },
            _ => None,
        }
    }

    pub fn as_arith(&self, ctx: &EvaluationContext) -> Option<f32> {
        match self {
            Operand::Float(f) => Some(*f),
            Operand::DataRegister(i) => ctx.registers.data(*i).ok(),
            Operand::PositionComponent(i, c) => ctx.registers.position_component(*i, *c).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self, ctx: &EvaluationContext) -> Option<bool> {
        match self {
            Operand::Bool(b) => Some(*b),
            Operand::IoRegister(i) => ctx.registers.io(*i).ok(),
            _ => None,
        }
    }

    pub fn as_point(&self, ctx: &EvaluationContext) -> Option<Point> {
        match self {
            Operand::Point(p) => Some(*p),
            Operand::PositionRegister(i) => ctx.registers.position(*i).ok(),
            Operand::RobotPose { cartesian } => Some(ctx.pose.as_point(*cartesian)),
            _ => None,
        }
    }

    /// Reduces the operand to a literal `Float`, `Bool` or `Point`: registers
    /// are read and sub-expressions evaluated.
    pub fn resolve(&self, ctx: &EvaluationContext) -> PendantResult<Operand> {
        let res = match self {
            Operand::Uninitialized => {
                return Err(PendantError::IncompatibleOperands(
                    "uninitialized operand".to_owned(),
                ));
            }
            Operand::Float(_) | Operand::Bool(_) | Operand::Point(_) => self.clone(),
            Operand::DataRegister(i) => Operand::Float(ctx.registers.data(*i)?),
            Operand::IoRegister(i) => Operand::Bool(ctx.registers.io(*i)?),
            Operand::PositionRegister(i) => Operand::Point(ctx.registers.position(*i)?),
            Operand::PositionComponent(i, c) => {
                Operand::Float(ctx.registers.position_component(*i, *c)?)
            }
            Operand::RobotPose { cartesian } => Operand::Point(ctx.pose.as_point(*cartesian)),
            Operand::SubExpression(sub) => sub.evaluate(ctx)?,
        };
        Ok(res)
    }

    /// Value equality after resolution. An uninitialized operand, or one that
    /// fails to resolve, equals nothing.
    pub fn same_value(&self, other: &Operand, ctx: &EvaluationContext) -> bool {
        let (Ok(a), Ok(b)) = (self.resolve(ctx), other.resolve(ctx)) else {
            return false;
        };
        match (a, b) {
            (Operand::Float(x), Operand::Float(y)) => x == y,
            (Operand::Bool(x), Operand::Bool(y)) => x == y,
            (Operand::Point(x), Operand::Point(y)) => x == y,
            _ => false,
        }
    }

    /// Number of edit slots the operand occupies in a token line.
    pub fn display_length(&self) -> usize {
        match self.as_sequence() {
            Some(seq) => seq.total_display_length(),
            None => 1,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Uninitialized => write!(f, "..."),
            Operand::Float(x) => write!(f, "{x}"),
            Operand::Bool(true) => write!(f, "ON"),
            Operand::Bool(false) => write!(f, "OFF"),
            Operand::DataRegister(i) => write!(f, "R[{}]", i + 1),
            Operand::IoRegister(i) => write!(f, "IO[{}]", i + 1),
            Operand::PositionRegister(i) => write!(f, "PR[{}]", i + 1),
            Operand::PositionComponent(i, c) => {
                let name = COMPONENT_NAMES.get(*c).copied().unwrap_or("?");
                write!(f, "PR[{},{}]", i + 1, name)
            }
            Operand::Point(p) => write!(f, "P{p}"),
            Operand::RobotPose { cartesian: true } => write!(f, "LPOS"),
            Operand::RobotPose { cartesian: false } => write!(f, "JPOS"),
            Operand::SubExpression(sub) => write!(f, "{sub}"),
        }
    }
}
