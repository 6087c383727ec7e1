use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{PendantError, PendantResult};

use super::{
    EvaluationContext,
    operand::{Capability, Operand},
    operator::Operator,
    point::Point,
};

/// A binary expression node. Either side may itself be a sub-expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpressionTree {
    pub left: Operand,
    pub op: Operator,
    pub right: Operand,
}

impl ExpressionTree {
    pub fn new(left: Operand, op: Operator, right: Operand) -> Self {
        ExpressionTree { left, op, right }
    }

    /// Evaluates both children, then dispatches on the capability they share,
    /// trying arithmetic, then point, then boolean.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> PendantResult<Operand> {
        let left = self.left.resolve(ctx)?;
        let right = self.right.resolve(ctx)?;

        if let (Some(x), Some(y)) = (left.as_arith(ctx), right.as_arith(ctx)) {
            return arith(self.op, x, y);
        }
        if let (Some(x), Some(y)) = (left.as_point(ctx), right.as_point(ctx)) {
            return point(self.op, &x, &y);
        }
        if let (Some(x), Some(y)) = (left.as_bool(ctx), right.as_bool(ctx)) {
            return boolean(self.op, x, y);
        }
        Err(PendantError::IncompatibleOperands(format!(
            "{} {} {}",
            left, self.op, right
        )))
    }
}

fn unsupported(op: Operator, capability: Capability) -> PendantError {
    PendantError::UnsupportedOperator {
        op: op.symbol().to_owned(),
        capability: capability.to_string(),
    }
}

fn arith(op: Operator, x: f32, y: f32) -> PendantResult<Operand> {
    let res = match op {
        Operator::Add => Operand::Float(x + y),
        Operator::Sub => Operand::Float(x - y),
        Operator::Mul => Operand::Float(x * y),
        // No zero check: IEEE inf / NaN propagate to the program.
        Operator::Div => Operand::Float(x / y),
        Operator::Mod => Operand::Float(x % y),
        Operator::IntDiv => {
            let q = (x as i32)
                .checked_div(y as i32)
                .ok_or(PendantError::DivisionByZero)?;
            Operand::Float(q as f32)
        }
        // Exact comparison, no epsilon.
        Operator::Eq => Operand::Bool(x == y),
        Operator::Ne => Operand::Bool(x != y),
        Operator::Gt => Operand::Bool(x > y),
        Operator::Lt => Operand::Bool(x < y),
        Operator::Ge => Operand::Bool(x >= y),
        Operator::Le => Operand::Bool(x <= y),
        Operator::And | Operator::Or | Operator::Not | Operator::Uninitialized => {
            return Err(unsupported(op, Capability::Arith));
        }
    };
    Ok(res)
}

fn point(op: Operator, x: &Point, y: &Point) -> PendantResult<Operand> {
    match op {
        Operator::Add => Ok(Operand::Point(x.offset_by(y))),
        Operator::Sub => Ok(Operand::Point(x.minus(y))),
        _ => Err(unsupported(op, Capability::Point)),
    }
}

fn boolean(op: Operator, x: bool, y: bool) -> PendantResult<Operand> {
    match op {
        Operator::And => Ok(Operand::Bool(x && y)),
        Operator::Or => Ok(Operand::Bool(x || y)),
        // Unary: only the left side counts.
        Operator::Not => Ok(Operand::Bool(!x)),
        _ => Err(unsupported(op, Capability::Bool)),
    }
}

impl Display for ExpressionTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.left, self.op, self.right)
    }
}
