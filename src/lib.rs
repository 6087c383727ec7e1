//! Core of a two-arm teach pendant simulator: typed operands and expressions,
//! pendant programs, and the engine that steps them against simulated arms.

pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod persistence;
pub mod program;
pub mod vm;

pub use error::{PendantError, PendantResult};
pub use logger::{LogMessage, Severity};
