use crate::log_warn;

use super::types::{
    Config, ExecutionConfig, LoggingConfig, MotionConfig, RegisterConfig, default_data_registers,
    default_io_registers, default_keep_files, default_max_file_kb, default_max_ticks,
    default_position_registers, default_settle_jitter_ms, default_steps_at_full_speed,
    default_tick_ms,
};

pub trait Validate {
    fn validate(&mut self);
}

impl Validate for RegisterConfig {
    fn validate(&mut self) {
        if self.data == 0 || self.data > 1000 {
            log_warn!(
                "Invalid data register count: {}. Using default: {}",
                self.data,
                default_data_registers()
            );
            self.data = default_data_registers();
        }

        if self.io == 0 || self.io > 256 {
            log_warn!(
                "Invalid I/O register count: {}. Using default: {}",
                self.io,
                default_io_registers()
            );
            self.io = default_io_registers();
        }

        if self.positions == 0 || self.positions > 1000 {
            log_warn!(
                "Invalid position register count: {}. Using default: {}",
                self.positions,
                default_position_registers()
            );
            self.positions = default_position_registers();
        }
    }
}

impl Validate for MotionConfig {
    fn validate(&mut self) {
        if self.tick_ms == 0 || self.tick_ms > 100 {
            log_warn!(
                "Invalid motion tick_ms: {}. Using default: {}",
                self.tick_ms,
                default_tick_ms()
            );
            self.tick_ms = default_tick_ms();
        }

        if self.steps_at_full_speed == 0 || self.steps_at_full_speed > 10_000 {
            log_warn!(
                "Invalid steps_at_full_speed: {}. Using default: {}",
                self.steps_at_full_speed,
                default_steps_at_full_speed()
            );
            self.steps_at_full_speed = default_steps_at_full_speed();
        }

        if self.settle_jitter_ms > 1000 {
            log_warn!(
                "Invalid settle_jitter_ms: {}. Using default: {}",
                self.settle_jitter_ms,
                default_settle_jitter_ms()
            );
            self.settle_jitter_ms = default_settle_jitter_ms();
        }
    }
}

impl Validate for ExecutionConfig {
    fn validate(&mut self) {
        if self.max_ticks == 0 {
            log_warn!("Invalid max_ticks: 0. Using default: {}", default_max_ticks());
            self.max_ticks = default_max_ticks();
        }
    }
}

impl Validate for LoggingConfig {
    fn validate(&mut self) {
        if self
            .directory
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            log_warn!("Invalid log directory: empty path. Using the default location");
            self.directory = None;
        }

        if self.max_file_kb == 0 || self.max_file_kb > 1024 * 1024 {
            log_warn!(
                "Invalid max_file_kb: {}. Using default: {}",
                self.max_file_kb,
                default_max_file_kb()
            );
            self.max_file_kb = default_max_file_kb();
        }

        if self.keep_files > 100 {
            log_warn!(
                "Invalid keep_files: {}. Using default: {}",
                self.keep_files,
                default_keep_files()
            );
            self.keep_files = default_keep_files();
        }
    }
}

impl Validate for Config {
    fn validate(&mut self) {
        self.registers.validate();
        self.motion.validate();
        self.execution.validate();
        self.logging.validate();
    }
}
