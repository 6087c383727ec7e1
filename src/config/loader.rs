use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};

use crate::{
    engine::SimulationTiming,
    log_error,
    logger::{LogRotation, Logger, LoggerMode},
    vm::RegisterBank,
};

use super::{
    types::{Config, LogOutput},
    validation::Validate,
};

pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("pendant");

        fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(Self::at(config_dir.join("config.toml")))
    }

    /// A loader for an explicit file, such as one given on the command line.
    pub fn at(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load_or_create(&self) -> Result<Config> {
        if !self.config_path.exists() {
            let default_config = Config::default();
            self.save(&default_config)?;
            Ok(default_config)
        } else {
            self.load_and_normalize()
        }
    }

    /// Reads the file without touching it. Unparsable content yields defaults.
    pub fn load(&self) -> Result<Config> {
        let content = fs::read_to_string(&self.config_path).context("Failed to read config file")?;

        let mut config: Config = toml::from_str(&content).unwrap_or_else(|e| {
            log_error!("Failed to parse config: {}. Using defaults.", e);
            Config::default()
        });

        config.validate();
        Ok(config)
    }

    fn load_and_normalize(&self) -> Result<Config> {
        let content = fs::read_to_string(&self.config_path).context("Failed to read config file")?;

        let mut config: Config = match toml::from_str(&content) {
            Ok(c) => c,
            Err(e) => {
                let backup_path = self.config_path.with_extension("toml.backup");
                fs::write(&backup_path, &content).context("Failed to write backup")?;

                log_error!(
                    "Config file corrupted: {}. Backup saved to {:?}. Using defaults.",
                    e,
                    backup_path
                );

                let default = Config::default();
                self.save(&default)?;
                return Ok(default);
            }
        };

        config.validate();

        let current_toml = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        if content.trim() != current_toml.trim() {
            self.save(&config)?;
        }

        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        let toml_string = toml::to_string_pretty(config).context("Failed to serialize config")?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_string).context("Failed to write config file")?;

        Ok(())
    }
}

impl Config {
    pub fn register_bank(&self) -> RegisterBank {
        RegisterBank::new(self.registers.data, self.registers.io, self.registers.positions)
    }

    pub fn simulation_timing(&self) -> SimulationTiming {
        SimulationTiming {
            tick: Duration::from_millis(self.motion.tick_ms),
            steps_at_full_speed: self.motion.steps_at_full_speed,
            settle_jitter: Duration::from_millis(self.motion.settle_jitter_ms),
        }
    }

    /// Points `logger` at the configured output and threshold.
    pub fn log_rotation(&self) -> LogRotation {
        LogRotation {
            max_bytes: self.logging.max_file_kb * 1024,
            keep: self.logging.keep_files,
        }
    }

    pub fn apply_logging(&self, logger: &Logger) {
        logger.set_rotation(self.log_rotation());
        if let Some(dir) = &self.logging.directory {
            logger.set_log_directory(dir.clone());
        }
        logger.set_mode(match self.logging.output {
            LogOutput::Terminal => LoggerMode::Standalone,
            LogOutput::File => LoggerMode::File,
            LogOutput::Full => LoggerMode::Full,
        });
        logger.set_threshold(self.logging.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::RunMode, logger::Severity};

    fn loader() -> (tempfile::TempDir, ConfigLoader) {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::at(dir.path().join("pendant").join("config.toml"));
        (dir, loader)
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let (_dir, loader) = loader();
        let config = loader.load_or_create().unwrap();
        assert_eq!(config, Config::default());
        assert!(loader.config_path().exists());
        assert_eq!(loader.load().unwrap(), Config::default());
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let (_dir, loader) = loader();
        fs::create_dir_all(loader.config_path().parent().unwrap()).unwrap();
        fs::write(
            loader.config_path(),
            "[execution]\ndefault_mode = \"single_step\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = loader.load_or_create().unwrap();
        assert_eq!(config.execution.default_mode, RunMode::SingleStep);
        assert_eq!(config.logging.level, Severity::Debug);
        assert_eq!(config.registers.data, 100);
        assert_eq!(config.execution.max_ticks, 100_000);

        let rewritten = fs::read_to_string(loader.config_path()).unwrap();
        assert!(rewritten.contains("[motion]"));
    }

    #[test]
    fn invalid_values_fall_back() {
        let (_dir, loader) = loader();
        fs::create_dir_all(loader.config_path().parent().unwrap()).unwrap();
        fs::write(
            loader.config_path(),
            "[registers]\ndata = 0\nio = 16\n\n[motion]\ntick_ms = 500\n",
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.registers.data, 100);
        assert_eq!(config.registers.io, 16);
        assert_eq!(config.motion.tick_ms, 4);
        assert_eq!(config.register_bank().io_len(), 16);
    }

    #[test]
    fn corrupted_file_is_backed_up() {
        let (_dir, loader) = loader();
        fs::create_dir_all(loader.config_path().parent().unwrap()).unwrap();
        fs::write(loader.config_path(), "[registers\ndata = ").unwrap();

        let config = loader.load_or_create().unwrap();
        assert_eq!(config, Config::default());
        let backup = loader.config_path().with_extension("toml.backup");
        assert_eq!(fs::read_to_string(backup).unwrap(), "[registers\ndata = ");
    }

    #[test]
    fn timing_follows_motion_settings() {
        let mut config = Config::default();
        config.motion.tick_ms = 10;
        config.motion.settle_jitter_ms = 0;
        let timing = config.simulation_timing();
        assert_eq!(timing.tick, Duration::from_millis(10));
        assert_eq!(timing.settle_jitter, Duration::ZERO);
        assert_eq!(timing.steps_at_full_speed, 25);
    }

    #[test]
    fn log_rotation_comes_from_logging_settings() {
        let (_dir, loader) = loader();
        fs::create_dir_all(loader.config_path().parent().unwrap()).unwrap();
        fs::write(
            loader.config_path(),
            "[logging]\nmax_file_kb = 64\nkeep_files = 2\n",
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(
            config.log_rotation(),
            LogRotation {
                max_bytes: 64 * 1024,
                keep: 2
            }
        );
        assert_eq!(Config::default().log_rotation(), LogRotation::default());
    }
}
