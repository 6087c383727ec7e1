use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Severity level of a log message, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The simulator cannot continue.
    Fatal,
    /// An operation failed but the simulator keeps running.
    Error,
    /// Something unexpected, such as an instruction skipped after an evaluation error.
    Warn,
    /// Progress of programs and devices.
    Info,
    /// Detailed execution traces.
    Debug,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Fatal => write!(f, "[FATAL]"),
            Severity::Error => write!(f, "[ERROR]"),
            Severity::Warn => write!(f, "[WARN]"),
            Severity::Info => write!(f, "[INFO]"),
            Severity::Debug => write!(f, "[DEBUG]"),
        }
    }
}

/// A structured log message, optionally tagged with the device it concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: Severity,
    pub device: Option<u8>,
    pub msg: String,
}

impl Display for LogMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.device {
            Some(device) => write!(f, "{} R{} {}", self.level, device, self.msg),
            None => write!(f, "{} {}", self.level, self.msg),
        }
    }
}

impl LogMessage {
    pub fn new(level: Severity, msg: String) -> Self {
        LogMessage {
            level,
            device: None,
            msg,
        }
    }

    pub fn for_device(mut self, device: u8) -> Self {
        self.device = Some(device);
        self
    }

    pub fn warn(msg: String) -> Self {
        Self::new(Severity::Warn, msg)
    }
}
