use serde::Serialize;

pub type PendantResult<T> = Result<T, PendantError>;

/// Errors raised by the program core.
///
/// Evaluation and instruction errors are values: the offending instruction
/// becomes a no-op and the error is reported. Only instruction pointer range
/// errors and unresolved control transfers fault an execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
pub enum PendantError {
    #[error("malformed token sequence: {0}")]
    MalformedSequence(String),

    #[error("incompatible operands: {0}")]
    IncompatibleOperands(String),

    #[error("unsupported operator {op} for {capability} operands")]
    UnsupportedOperator { op: String, capability: String },

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("unresolved label LBL[{0}]")]
    UnresolvedLabel(u32),

    #[error("unresolved call to {program} on device {device}")]
    UnresolvedCall { program: String, device: u8 },

    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: isize,
        len: usize,
    },

    #[error("{0} is full")]
    CapacityExceeded(&'static str),

    #[error("a token sequence keeps at least one element")]
    SequenceTooShort,

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("call on device {device} failed: {reason}")]
    CallFailed { device: u8, reason: String },

    #[error("a program named {0} already exists")]
    DuplicateName(String),

    #[error("device {0} is busy")]
    DeviceBusy(u8),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl PendantError {
    pub fn out_of_range(what: &'static str, index: impl TryInto<isize>, len: usize) -> Self {
        Self::IndexOutOfRange {
            what,
            index: index.try_into().unwrap_or(isize::MAX),
            len,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedSequence(msg.into())
    }

    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    pub fn persistence(msg: impl ToString) -> Self {
        Self::Persistence(msg.to_string())
    }

    /// Errors that stop an execution instead of being skipped over.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedLabel(_)
                | Self::UnresolvedCall { .. }
                | Self::CallFailed { .. }
                | Self::DeviceBusy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_readable() {
        assert_eq!(
            PendantError::out_of_range("data register", 120usize, 100).to_string(),
            "data register index 120 out of range (len 100)"
        );
        assert_eq!(
            PendantError::UnresolvedLabel(4).to_string(),
            "unresolved label LBL[4]"
        );
        assert!(
            PendantError::malformed("even length")
                .to_string()
                .contains("malformed token sequence")
        );
    }

    #[test]
    fn only_transfers_are_fatal() {
        assert!(PendantError::UnresolvedLabel(1).is_fatal());
        assert!(PendantError::DeviceBusy(1).is_fatal());
        assert!(!PendantError::DivisionByZero.is_fatal());
        assert!(!PendantError::mismatch("x").is_fatal());
    }
}
