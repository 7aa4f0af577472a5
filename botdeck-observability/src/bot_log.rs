//! The bot's plain-text log file.
//!
//! One record per line:
//!
//! ```text
//! [2025-01-15T10:00:00.000Z] INFO: Bot process started with PID: 4242
//! ```
//!
//! Lines that do not follow this shape (stack traces, blank lines, output
//! of the bot's own dependencies) are skipped when reading.

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Entries returned when the caller does not ask for a limit.
pub const DEFAULT_LIMIT: usize = 100;

const LINE_PATTERN: &str = r"^\[(.*?)\] (\w+): (.*)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

/// Handle on a bot log file.
pub struct BotLog {
    path: PathBuf,
    line: Regex,
}

impl BotLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, regex::Error> {
        Ok(Self {
            path: path.into(),
            line: Regex::new(LINE_PATTERN)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse one line; `None` for anything that is not a log record.
    pub fn parse_line(&self, line: &str) -> Option<LogEntry> {
        let caps = self.line.captures(line.trim_end_matches('\r'))?;
        let level = caps.get(2)?.as_str().parse().ok()?;
        Some(LogEntry {
            timestamp: caps.get(1)?.as_str().to_string(),
            level,
            message: caps.get(3)?.as_str().to_string(),
        })
    }

    /// The `limit` most recent entries at `level` (any level when `None`),
    /// newest first. A missing file reads as empty. Bytes that are not
    /// UTF-8 are replaced per line rather than failing the whole read.
    pub fn read(&self, level: Option<LogLevel>, limit: usize) -> io::Result<Vec<LogEntry>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "bot log: file does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "bot log: read failed");
                return Err(e);
            }
        };

        Ok(content
            .split(|&b| b == b'\n')
            .rev()
            .filter_map(|line| self.parse_line(&String::from_utf8_lossy(line)))
            .filter(|entry| level.is_none_or(|l| entry.level == l))
            .take(limit)
            .collect())
    }

    /// Append a record stamped with the current UTC time. The parent
    /// directory is created when missing.
    pub fn append(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", format_line(level, message))
    }
}

/// `[<now>] LEVEL: message`, without the trailing newline.
pub fn format_line(level: LogLevel, message: &str) -> String {
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    format!("[{ts}] {level}: {message}")
}

/// One-shot read of `path`.
pub fn read_logs(path: &Path, level: Option<LogLevel>, limit: usize) -> io::Result<Vec<LogEntry>> {
    BotLog::open(path).map_err(io::Error::other)?.read(level, limit)
}

/// One-shot append to `path`.
pub fn append_line(path: &Path, level: LogLevel, message: &str) -> io::Result<()> {
    BotLog::open(path).map_err(io::Error::other)?.append(level, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn log_at(dir: &Path) -> BotLog {
        BotLog::open(dir.join("logs/bot.log")).unwrap()
    }

    // ── Parsing ──────────────────────────────────────────────────

    #[test]
    fn parses_well_formed_line() {
        let log = BotLog::open("unused.log").unwrap();
        let entry = log
            .parse_line("[2025-01-15T10:00:00.000Z] INFO: Bot process started with PID: 42")
            .unwrap();
        assert_eq!(entry.timestamp, "2025-01-15T10:00:00.000Z");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "Bot process started with PID: 42");
    }

    #[test]
    fn message_may_contain_colons_and_brackets() {
        let log = BotLog::open("unused.log").unwrap();
        let entry = log.parse_line("[t] ERROR: failed: [code 7]").unwrap();
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.message, "failed: [code 7]");
    }

    #[test]
    fn rejects_non_record_lines() {
        let log = BotLog::open("unused.log").unwrap();
        assert!(log.parse_line("").is_none());
        assert!(log.parse_line("    at Object.<anonymous> (index.js:1:1)").is_none());
        assert!(log.parse_line("[t] NOTICE: unknown level").is_none());
    }

    #[test]
    fn level_parsing_is_case_insensitive() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("Debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("all".parse::<LogLevel>().is_err());
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LogLevel::Warning).unwrap(), "\"warning\"");
        assert_eq!(LogLevel::Warning.to_string(), "WARNING");
    }

    // ── Reading ──────────────────────────────────────────────────

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        assert!(log_at(dir.path()).read(None, DEFAULT_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn newest_entries_come_first_and_limit_applies() {
        let dir = tempdir().unwrap();
        let log = log_at(dir.path());
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(
            log.path(),
            "[1] INFO: first\nnot a record\n[2] ERROR: second\n[3] INFO: third\n",
        )
        .unwrap();

        let all = log.read(None, DEFAULT_LIMIT).unwrap();
        let messages: Vec<&str> = all.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["third", "second", "first"]);

        let two = log.read(None, 2).unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].timestamp, "3");
    }

    #[test]
    fn level_filter_applies_before_limit() {
        let dir = tempdir().unwrap();
        let log = log_at(dir.path());
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(
            log.path(),
            "[1] ERROR: old failure\n[2] INFO: a\n[3] INFO: b\n[4] INFO: c\n",
        )
        .unwrap();

        let errors = log.read(Some(LogLevel::Error), 1).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "old failure");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let dir = tempdir().unwrap();
        let log = log_at(dir.path());
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(
            log.path(),
            b"[1] INFO: ok\r\n\xff\xff\n[2] WARNING: caf\xe9 closed\n[3] INFO: last",
        )
        .unwrap();

        let entries = log.read(None, DEFAULT_LIMIT).unwrap();
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["last", "caf\u{fffd} closed", "ok"]);
        assert_eq!(entries[1].level, LogLevel::Warning);
    }

    // ── Appending ────────────────────────────────────────────────

    #[test]
    fn append_creates_directory_and_reads_back() {
        let dir = tempdir().unwrap();
        let log = log_at(dir.path());
        log.append(LogLevel::Info, "Bot process started with PID: 7").unwrap();
        log.append(LogLevel::Warning, "slow start").unwrap();

        let entries = read_logs(log.path(), None, DEFAULT_LIMIT).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Warning);
        assert_eq!(entries[1].message, "Bot process started with PID: 7");
        assert!(entries[1].timestamp.ends_with('Z'));
    }

    #[test]
    fn append_line_writes_record_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot.log");
        append_line(&path, LogLevel::Error, "crashed").unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with('['));
        assert!(raw.ends_with("] ERROR: crashed\n"));
    }
}
