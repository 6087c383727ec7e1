//! Value model and expression language of pendant programs.

pub mod evaluation_context;
pub mod expression;
pub mod operand;
pub mod operator;
pub mod point;
pub mod registers;
pub mod token_sequence;

pub use evaluation_context::{ActiveFrames, EvaluationContext};
pub use expression::ExpressionTree;
pub use operand::{Capability, Operand, SubExpression};
pub use operator::Operator;
pub use point::{Point, RobotPose};
pub use registers::RegisterBank;
pub use token_sequence::{Token, TokenSequence};
