// Leveled event log returned to whoever runs a script

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Failure,
}

impl LogLevel {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogLevel::Info => "ℹ️ ",
            LogLevel::Success => "✅",
            LogLevel::Warning => "⚠️ ",
            LogLevel::Failure => "❌",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level.symbol(), self.message)
    }
}

/// Events recorded during a run, in order
///
/// Each entry is mirrored to `tracing` so structured logs carry the same
/// story the operator sees.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog {
    entries: Vec<LogEntry>,
}

impl ScriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(level = "info", "{}", message);
        self.push(LogLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(level = "success", "{}", message);
        self.push(LogLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.push(LogLevel::Warning, message);
    }

    pub fn failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.push(LogLevel::Failure, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(LogLevel::Failure) > 0
    }

    fn push(&mut self, level: LogLevel, message: String) {
        self.entries.push(LogEntry {
            level,
            message,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order_and_level() {
        let mut log = ScriptLog::new();
        log.info("starting");
        log.success("moved");
        log.warning("missing");
        log.failure("broken");

        let levels: Vec<LogLevel> = log.entries().iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![LogLevel::Info, LogLevel::Success, LogLevel::Warning, LogLevel::Failure]
        );
        assert_eq!(log.count(LogLevel::Success), 1);
        assert!(log.has_failures());
        assert_eq!(log.entries()[1].to_string(), "✅ moved");
    }
}
