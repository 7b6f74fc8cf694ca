//! # Logger Service
//!
//! This crate implements the kernel's human-readable audit log.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured: callers build a [`LogEntry`], and the
//! [`KernelLog`] sink decides where it goes.
//!
//! - stdout always receives every entry
//! - the optional log file is capped at a fixed number of lines; an entry that
//!   would cross the cap is dropped whole, and everything after it too
//! - file I/O failures disable the file and are reported once through
//!   `tracing`; they never stop the kernel

mod sink;

pub use sink::{KernelLog, DEFAULT_MAX_LOG_LINES};

use core_types::Pid;
use std::fmt;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

/// A structured log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Source process (if known)
    pub source: Option<Pid>,
    /// Log message; may span several lines
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            source: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    /// Sets the source process
    pub fn with_source(mut self, source: Pid) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Renders the entry as text terminated by a newline
    pub fn render(&self) -> String {
        let mut out = self.to_string();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            LogLevel::Warn => write!(f, "WARN ")?,
            LogLevel::Error => write!(f, "ERROR ")?,
            LogLevel::Debug | LogLevel::Info => {}
        }
        write!(f, "{}", self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}
