//! User configuration, read from `config.toml` in the pendant config directory.

mod defaults;
mod loader;
mod types;
mod validation;

pub use loader::ConfigLoader;
pub use types::{Config, ExecutionConfig, LogOutput, LoggingConfig, MotionConfig, RegisterConfig};
pub use validation::Validate;
