use std::fs::{self, File, OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use crossbeam_channel::{Receiver, Sender, unbounded};

pub mod message;

pub use message::{LogMessage, Severity};

/// Global logger instance
static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

const LOG_FILE_NAME: &str = "pendant.log";

/// When the log file is archived and how many archives survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotation {
    pub max_bytes: u64,
    /// Archives kept next to the live file, `pendant.log.1` being the newest.
    pub keep: usize,
}

impl Default for LogRotation {
    fn default() -> Self {
        LogRotation {
            max_bytes: 1024 * 1024,
            keep: 5,
        }
    }
}

/// Appends log lines to `pendant.log`, archiving it once it would outgrow
/// the rotation limit.
#[derive(Debug)]
pub struct LogFileWriter {
    log_dir: PathBuf,
    rotation: LogRotation,
    file: Option<File>,
    written: u64,
}

impl LogFileWriter {
    pub fn new(rotation: LogRotation) -> io::Result<Self> {
        Self::in_directory(default_log_directory(), rotation)
    }

    pub fn in_directory(log_dir: PathBuf, rotation: LogRotation) -> io::Result<Self> {
        create_dir_all(&log_dir)?;
        Ok(LogFileWriter {
            log_dir,
            rotation,
            file: None,
            written: 0,
        })
    }

    pub fn set_rotation(&mut self, rotation: LogRotation) {
        self.rotation = rotation;
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    fn archive_path(&self, generation: usize) -> PathBuf {
        self.log_dir.join(format!("{LOG_FILE_NAME}.{generation}"))
    }

    /// Shifts every archive one generation up, dropping the oldest, and
    /// archives the live file as generation 1.
    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        self.written = 0;
        let live = self.log_file_path();
        if self.rotation.keep == 0 {
            return if live.exists() { fs::remove_file(live) } else { Ok(()) };
        }
        let oldest = self.archive_path(self.rotation.keep);
        if oldest.exists() {
            fs::remove_file(oldest)?;
        }
        for generation in (1..self.rotation.keep).rev() {
            let from = self.archive_path(generation);
            if from.exists() {
                fs::rename(from, self.archive_path(generation + 1))?;
            }
        }
        if live.exists() {
            fs::rename(live, self.archive_path(1))?;
        }
        Ok(())
    }

    fn open(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let path = self.log_file_path();
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            self.written = file.metadata().map(|m| m.len()).unwrap_or(0);
            self.file = Some(file);
        }
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(io::Error::other("log file closed")),
        }
    }

    pub fn write_log(&mut self, log_msg: &LogMessage) -> io::Result<()> {
        let line = format!("{log_msg}\n");
        self.open()?;
        if self.written > 0 && self.written + line.len() as u64 > self.rotation.max_bytes {
            self.rotate()?;
        }
        let file = self.open()?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        self.written += line.len() as u64;
        Ok(())
    }
}

fn default_log_directory() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("pendant").join("logs")
}

/// Logger operating mode
#[derive(Debug, Clone)]
pub enum LoggerMode {
    /// Logs directly to the terminal
    Standalone,
    /// Logs through a channel, for a pendant front-end embedding the core
    Embedded(Sender<LogMessage>),
    /// Logs to the rotating log file only
    File,
    /// Logs to the file and the terminal
    Full,
}

pub struct Logger {
    mode: Mutex<LoggerMode>,
    threshold: Mutex<Severity>,
    rotation: Mutex<LogRotation>,
    file_writer: Mutex<Option<LogFileWriter>>,
}

impl Logger {
    pub fn new(mode: LoggerMode) -> Self {
        let logger = Logger {
            mode: Mutex::new(LoggerMode::Standalone),
            threshold: Mutex::new(Severity::Info),
            rotation: Mutex::new(LogRotation::default()),
            file_writer: Mutex::new(None),
        };
        logger.set_mode(mode);
        logger
    }

    pub fn set_mode(&self, mode: LoggerMode) {
        if matches!(mode, LoggerMode::File | LoggerMode::Full) {
            if let Ok(mut file_writer) = self.file_writer.lock() {
                if file_writer.is_none() {
                    *file_writer = match LogFileWriter::new(self.rotation()) {
                        Ok(writer) => Some(writer),
                        Err(e) => {
                            eprintln!("Failed to create log file writer: {}", e);
                            None
                        }
                    };
                }
            }
        }
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }

    /// Messages less severe than `level` are dropped.
    pub fn set_threshold(&self, level: Severity) {
        if let Ok(mut threshold) = self.threshold.lock() {
            *threshold = level;
        }
    }

    fn rotation(&self) -> LogRotation {
        self.rotation.lock().map(|r| *r).unwrap_or_default()
    }

    pub fn set_rotation(&self, rotation: LogRotation) {
        if let Ok(mut current) = self.rotation.lock() {
            *current = rotation;
        }
        if let Ok(mut file_writer) = self.file_writer.lock() {
            if let Some(writer) = file_writer.as_mut() {
                writer.set_rotation(rotation);
            }
        }
    }

    pub fn set_log_directory(&self, dir: PathBuf) {
        let writer = match LogFileWriter::in_directory(dir, self.rotation()) {
            Ok(writer) => Some(writer),
            Err(e) => {
                eprintln!("Failed to create log file writer: {}", e);
                None
            }
        };
        if let Ok(mut file_writer) = self.file_writer.lock() {
            *file_writer = writer;
        }
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.file_writer
            .lock()
            .ok()
            .and_then(|w| w.as_ref().map(LogFileWriter::log_file_path))
    }

    fn write_to_file(&self, log_msg: &LogMessage) {
        if let Ok(mut file_writer) = self.file_writer.lock() {
            if let Some(writer) = file_writer.as_mut() {
                if let Err(e) = writer.write_log(log_msg) {
                    eprintln!("Failed to write to log file: {}", e);
                }
            }
        }
    }

    fn write_to_terminal(log_msg: &LogMessage) {
        match log_msg.level {
            Severity::Fatal | Severity::Error => {
                eprintln!("{}", log_msg);
                let _ = std::io::stderr().flush();
            }
            _ => {
                println!("{}", log_msg);
                let _ = std::io::stdout().flush();
            }
        }
    }

    pub fn log_message(&self, log_msg: LogMessage) {
        let threshold = self.threshold.lock().map(|t| *t).unwrap_or(Severity::Debug);
        if log_msg.level > threshold {
            return;
        }
        let Ok(mode) = self.mode.lock() else {
            return;
        };
        match &*mode {
            LoggerMode::Standalone => Self::write_to_terminal(&log_msg),
            LoggerMode::Embedded(sender) => {
                if sender.try_send(log_msg.clone()).is_err() {
                    eprintln!("Logger channel error: {}", log_msg);
                }
            }
            LoggerMode::File => self.write_to_file(&log_msg),
            LoggerMode::Full => {
                self.write_to_file(&log_msg);
                Self::write_to_terminal(&log_msg);
            }
        }
    }

    pub fn log(&self, level: Severity, msg: String) {
        self.log_message(LogMessage::new(level, msg));
    }

    pub fn debug(&self, msg: String) {
        self.log(Severity::Debug, msg);
    }

    pub fn info(&self, msg: String) {
        self.log(Severity::Info, msg);
    }

    pub fn warn(&self, msg: String) {
        self.log(Severity::Warn, msg);
    }

    pub fn error(&self, msg: String) {
        self.log(Severity::Error, msg);
    }
}

/// Initialize the global logger in standalone mode
pub fn init_standalone() {
    let _ = GLOBAL_LOGGER.set(Logger::new(LoggerMode::Standalone));
}

/// Create a logging channel pair for embedded mode
pub fn create_log_channel() -> (Sender<LogMessage>, Receiver<LogMessage>) {
    unbounded()
}

/// Get the global logger instance
pub fn get_logger() -> &'static Logger {
    GLOBAL_LOGGER.get_or_init(|| Logger::new(LoggerMode::Standalone))
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().debug(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().warn(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().error(format!($($arg)*))
    };
}

/// Drop-in replacement for println! that goes through the logging system
#[macro_export]
macro_rules! log_println {
    () => {
        $crate::logger::get_logger().info("".to_string())
    };
    ($($arg:tt)*) => {
        $crate::logger::get_logger().info(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_mode_forwards_messages() {
        let (tx, rx) = create_log_channel();
        let logger = Logger::new(LoggerMode::Embedded(tx));
        logger.info("program started".to_string());
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.level, Severity::Info);
        assert_eq!(msg.msg, "program started");
    }

    #[test]
    fn threshold_drops_verbose_messages() {
        let (tx, rx) = create_log_channel();
        let logger = Logger::new(LoggerMode::Embedded(tx));
        logger.set_threshold(Severity::Warn);
        logger.debug("trace".to_string());
        logger.info("info".to_string());
        logger.error("bad".to_string());
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].msg, "bad");
    }

    #[test]
    fn file_writer_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            LogFileWriter::in_directory(dir.path().to_path_buf(), LogRotation::default()).unwrap();
        writer.write_log(&LogMessage::warn("skipped R[3]".to_string()).for_device(1)).unwrap();
        let content = std::fs::read_to_string(writer.log_file_path()).unwrap();
        assert_eq!(content, "[WARN] R1 skipped R[3]\n");
    }

    #[test]
    fn rotation_keeps_the_configured_archives() {
        let dir = tempfile::tempdir().unwrap();
        let rotation = LogRotation {
            max_bytes: 20,
            keep: 2,
        };
        let mut writer = LogFileWriter::in_directory(dir.path().to_path_buf(), rotation).unwrap();
        for n in 0..5 {
            writer
                .write_log(&LogMessage::new(Severity::Info, format!("line {n}")))
                .unwrap();
        }
        let live = std::fs::read_to_string(writer.log_file_path()).unwrap();
        assert_eq!(live, "[INFO] line 4\n");
        let newest = std::fs::read_to_string(dir.path().join("pendant.log.1")).unwrap();
        assert_eq!(newest, "[INFO] line 3\n");
        assert!(dir.path().join("pendant.log.2").exists());
        assert!(!dir.path().join("pendant.log.3").exists());
    }
}
