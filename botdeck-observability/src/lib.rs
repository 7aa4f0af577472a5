pub mod bot_log;

pub use bot_log::{BotLog, LogEntry, LogLevel, append_line, read_logs};
