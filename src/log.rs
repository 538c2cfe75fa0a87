use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use time::{macros::format_description, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Ordered log of one import. Every line is also traced and, when a log
/// file is configured, appended to it.
#[derive(Debug, Default)]
pub struct ImportLog {
    entries: Vec<LogEntry>,
    file: Option<PathBuf>,
    file_failed: bool,
}

impl ImportLog {
    pub fn new(file: Option<PathBuf>) -> Self {
        let mut file_failed = false;
        if let Some(path) = &file {
            if let Err(err) = append_session_header(path) {
                tracing::warn!("log file {} unavailable: {err}", path.display());
                file_failed = true;
            }
        }
        Self {
            entries: Vec::new(),
            file,
            file_failed,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Info, message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Warn, message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Error, message));
    }

    pub fn push(&mut self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => tracing::info!("Media Import: {}", entry.message),
            LogLevel::Warn => tracing::warn!("Media Import: {}", entry.message),
            LogLevel::Error => tracing::error!("Media Import: {}", entry.message),
        }
        if let Some(path) = &self.file {
            if let Err(err) = append_log_file(path, entry.level, &entry.message) {
                // Warn once per import; the lines are still kept in memory.
                if !self.file_failed {
                    tracing::warn!("cannot append to log file {}: {err}", path.display());
                    self.file_failed = true;
                }
            }
        }
        self.entries.push(entry);
    }

    pub fn into_lines(self) -> Vec<String> {
        self.entries.into_iter().map(|entry| entry.message).collect()
    }
}

pub fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn append_log_file(path: &Path, level: LogLevel, message: &str) -> io::Result<()> {
    let label = log_level_label(level);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "[{label}] {message}")
}

fn append_session_header(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let stamp = OffsetDateTime::now_utc()
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "=== import {stamp} UTC ===")
}
