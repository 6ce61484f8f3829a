// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging output backends (console and file).

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Log level enumeration for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Debug: detailed development information
    Debug = 0,
    /// Info: general information about normal operation
    Info = 1,
    /// Warning: potentially harmful situations
    Warning = 2,
    /// Error: error conditions
    Error = 3,
}

impl LogLevel {
    /// Returns the string representation of the log level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warning => "WARN ",
            Self::Error => "ERROR",
        }
    }

    /// Most verbose `log` filter that still passes this level.
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Debug => log::LevelFilter::Trace,
            Self::Info => log::LevelFilter::Info,
            Self::Warning => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warning,
            log::Level::Info => Self::Info,
            log::Level::Debug | log::Level::Trace => Self::Debug,
        }
    }
}

/// Output destination trait for log messages.
///
/// Implementations must be thread-safe and handle errors gracefully.
pub trait Output: Send + Sync {
    /// Write one already-formatted line (without trailing newline).
    fn write(&self, level: LogLevel, line: &str) -> io::Result<()>;

    /// Flush any buffered output.
    fn flush(&self) -> io::Result<()>;
}

/// Writes to stderr with level prefix and newline.
pub struct ConsoleOutput {
    level_filter: LogLevel,
}

impl ConsoleOutput {
    pub fn new(level_filter: LogLevel) -> Self {
        Self { level_filter }
    }
}

impl Output for ConsoleOutput {
    fn write(&self, level: LogLevel, line: &str) -> io::Result<()> {
        if level < self.level_filter {
            return Ok(());
        }
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "[{}] {}", level.as_str(), line)
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Appends log lines to a file with level prefix and newline.
pub struct FileOutput {
    file: Mutex<File>,
    level_filter: LogLevel,
}

impl FileOutput {
    /// Create a new file output, creating/truncating the file at the given path.
    pub fn new<P: AsRef<Path>>(path: P, level_filter: LogLevel) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            level_filter,
        })
    }
}

impl Output for FileOutput {
    fn write(&self, level: LogLevel, line: &str) -> io::Result<()> {
        if level < self.level_filter {
            return Ok(());
        }
        let mut file = self.file.lock();
        writeln!(file, "[{}] {}", level.as_str(), line)
    }

    fn flush(&self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_from_log_crate() {
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Debug);
        assert_eq!(LogLevel::from(log::Level::Warn), LogLevel::Warning);
        assert_eq!(LogLevel::Error.to_level_filter(), log::LevelFilter::Error);
    }

    #[test]
    fn test_file_output_filters_and_writes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bus.log");
        let output = FileOutput::new(&path, LogLevel::Info).expect("create log file");

        output.write(LogLevel::Debug, "dropped").expect("write");
        output.write(LogLevel::Warning, "[events] kept").expect("write");
        output.flush().expect("flush");

        let content = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(content, "[WARN ] [events] kept\n");
    }
}
