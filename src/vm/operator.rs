use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The operator vocabulary of pendant expressions.
///
/// Each operator persists as its numeric id, which never changes between
/// versions. `Uninitialized` is the blank slot shown while the operator is
/// being picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Operator {
    #[default]
    Uninitialized,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    IntDiv,
    // Relational
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    // Boolean
    And,
    Or,
    Not,
}

pub const ALL_OPERATORS: [Operator; 16] = [
    Operator::Add,
    Operator::Sub,
    Operator::Mul,
    Operator::Div,
    Operator::Mod,
    Operator::IntDiv,
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Lt,
    Operator::Ge,
    Operator::Le,
    Operator::And,
    Operator::Or,
    Operator::Not,
    Operator::Uninitialized,
];

impl Operator {
    pub const fn id(self) -> u8 {
        match self {
            Operator::Add => 0,
            Operator::Sub => 1,
            Operator::Mul => 2,
            Operator::Div => 3,
            Operator::Mod => 4,
            Operator::IntDiv => 5,
            Operator::Eq => 6,
            Operator::Ne => 7,
            Operator::Gt => 8,
            Operator::Lt => 9,
            Operator::Ge => 10,
            Operator::Le => 11,
            Operator::And => 12,
            Operator::Or => 13,
            Operator::Not => 14,
            Operator::Uninitialized => 255,
        }
    }

    pub fn from_id(id: u8) -> Option<Operator> {
        ALL_OPERATORS.into_iter().find(|op| op.id() == id)
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "MOD",
            Operator::IntDiv => "DIV",
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::Uninitialized => "...",
        }
    }
}

impl From<Operator> for u8 {
    fn from(op: Operator) -> Self {
        op.id()
    }
}

impl TryFrom<u8> for Operator {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Operator::from_id(id).ok_or_else(|| format!("unknown operator id {id}"))
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_reversible() {
        let ids: HashSet<u8> = ALL_OPERATORS.iter().map(|op| op.id()).collect();
        assert_eq!(ids.len(), ALL_OPERATORS.len());
        for op in ALL_OPERATORS {
            assert_eq!(Operator::from_id(op.id()), Some(op));
        }
        assert_eq!(Operator::from_id(42), None);
    }

    #[test]
    fn ids_are_stable() {
        assert_eq!(Operator::Add.id(), 0);
        assert_eq!(Operator::IntDiv.id(), 5);
        assert_eq!(Operator::Le.id(), 11);
        assert_eq!(Operator::Not.id(), 14);
        assert_eq!(Operator::Uninitialized.id(), 255);
    }

    #[test]
    fn persists_as_numeric_id() {
        assert_eq!(serde_json::to_string(&Operator::Mod).unwrap(), "4");
        let op: Operator = serde_json::from_str("12").unwrap();
        assert_eq!(op, Operator::And);
        assert!(serde_json::from_str::<Operator>("77").is_err());
    }
}
