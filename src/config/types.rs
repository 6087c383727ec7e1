use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{engine::RunMode, logger::Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub registers: RegisterConfig,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sizes of the shared register banks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegisterConfig {
    #[serde(default = "default_data_registers")]
    pub data: usize,

    #[serde(default = "default_io_registers")]
    pub io: usize,

    #[serde(default = "default_position_registers")]
    pub positions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MotionConfig {
    /// Interpolate moves on a motion thread. When off, moves complete at once.
    #[serde(default = "default_simulate")]
    pub simulate: bool,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_steps_at_full_speed")]
    pub steps_at_full_speed: u32,

    #[serde(default = "default_settle_jitter_ms")]
    pub settle_jitter_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionConfig {
    #[serde(default)]
    pub default_mode: RunMode,

    /// Cell ticks before a run is given up.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Terminal,
    File,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_output")]
    pub output: LogOutput,

    #[serde(default = "default_log_level")]
    pub level: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// The log file is archived once it would grow past this size.
    #[serde(default = "default_max_file_kb")]
    pub max_file_kb: u64,

    #[serde(default = "default_keep_files")]
    pub keep_files: usize,
}

pub(super) fn default_data_registers() -> usize {
    100
}

pub(super) fn default_io_registers() -> usize {
    32
}

pub(super) fn default_position_registers() -> usize {
    100
}

fn default_simulate() -> bool {
    true
}

pub(super) fn default_tick_ms() -> u64 {
    4
}

pub(super) fn default_steps_at_full_speed() -> u32 {
    25
}

pub(super) fn default_settle_jitter_ms() -> u64 {
    6
}

pub(super) fn default_max_ticks() -> usize {
    100_000
}

fn default_log_output() -> LogOutput {
    LogOutput::Terminal
}

fn default_log_level() -> Severity {
    Severity::Info
}

pub(super) fn default_max_file_kb() -> u64 {
    1024
}

pub(super) fn default_keep_files() -> usize {
    5
}
