use crate::{engine::RunMode, logger::Severity};

use super::types::{Config, ExecutionConfig, LogOutput, LoggingConfig, MotionConfig, RegisterConfig};

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            data: 100,
            io: 32,
            positions: 100,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            simulate: true,
            tick_ms: 4,
            steps_at_full_speed: 25,
            settle_jitter_ms: 6,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_mode: RunMode::Full,
            max_ticks: 100_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Terminal,
            level: Severity::Info,
            directory: None,
            max_file_kb: 1024,
            keep_files: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registers: RegisterConfig::default(),
            motion: MotionConfig::default(),
            execution: ExecutionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
