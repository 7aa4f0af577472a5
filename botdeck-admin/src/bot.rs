//! Start, stop and check on the bot process.
//!
//! The running bot is tracked only through its PID file, so the dashboard
//! can be restarted without losing track of a bot it launched earlier.
//! Liveness is `kill(pid, 0)`; stopping sends `SIGTERM` and does not wait.

use botdeck_core::config::BotConfig;
use botdeck_core::error::{DeckError, Result};
use botdeck_observability::{BotLog, LogLevel};
use serde::Serialize;
use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// What the bot endpoints report back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotReport {
    pub success: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BotReport {
    fn running(success: bool, pid: i32) -> Self {
        Self {
            success,
            status: "running",
            pid: Some(pid),
            message: None,
        }
    }

    fn stopped(success: bool) -> Self {
        Self {
            success,
            status: "stopped",
            pid: None,
            message: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Recorded state of the PID file.
enum PidState {
    Missing,
    /// File present but unreadable as a PID, or the process is gone.
    Stale,
    Alive(i32),
}

pub struct BotController {
    config: BotConfig,
    log: BotLog,
    // start/stop are read-then-act on the PID file
    lock: Mutex<()>,
}

impl BotController {
    pub fn new(config: BotConfig, log: BotLog) -> Self {
        Self {
            config,
            log,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn status(&self) -> BotReport {
        match self.pid_state() {
            PidState::Alive(pid) => BotReport::running(true, pid),
            _ => BotReport::stopped(true),
        }
    }

    /// Launch the bot unless it is already running.
    pub async fn start(&self) -> Result<BotReport> {
        let _guard = self.lock.lock().await;

        match self.pid_state() {
            PidState::Alive(pid) => {
                return Ok(BotReport::running(false, pid).with_message("Bot is already running"));
            }
            PidState::Stale => {
                warn!(path = %self.config.pid_file.display(), "bot: removing stale PID file");
                self.remove_pid_file()?;
            }
            PidState::Missing => {}
        }

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            warn!(command = %self.config.command, error = %e, "bot: spawn failed");
            DeckError::Bot(format!("Failed to start bot: {e}"))
        })?;
        let pid = i32::try_from(child.id())
            .map_err(|_| DeckError::Bot(format!("PID {} out of range", child.id())))?;

        // Reap the child once it exits so a dead bot never lingers as a zombie
        // that still answers `kill(pid, 0)`.
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        self.write_pid_file(pid)?;
        self.append_log(LogLevel::Info, &format!("Bot process started with PID: {pid}"));
        info!(pid, command = %self.config.command, "bot: started");

        Ok(BotReport::running(true, pid))
    }

    /// Send `SIGTERM` to the recorded PID and forget it.
    pub async fn stop(&self) -> Result<BotReport> {
        let _guard = self.lock.lock().await;

        match self.pid_state() {
            PidState::Missing => Ok(BotReport::stopped(false).with_message("Bot is not running")),
            PidState::Stale => {
                self.remove_pid_file()?;
                info!("bot: not running, stale PID file removed");
                Ok(BotReport::stopped(true)
                    .with_message("Bot was not running, cleaned up stale PID file"))
            }
            PidState::Alive(pid) => {
                terminate(pid).map_err(|e| {
                    warn!(pid, error = %e, "bot: SIGTERM failed");
                    DeckError::Bot(format!("Failed to stop bot: {e}"))
                })?;
                self.append_log(LogLevel::Info, &format!("Bot process with PID {pid} was stopped"));
                self.remove_pid_file()?;
                info!(pid, "bot: stopped");
                Ok(BotReport::stopped(true))
            }
        }
    }

    fn pid_state(&self) -> PidState {
        let content = match fs::read_to_string(&self.config.pid_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return PidState::Missing,
            Err(e) => {
                warn!(path = %self.config.pid_file.display(), error = %e, "bot: unreadable PID file");
                return PidState::Stale;
            }
        };
        match content.trim().parse::<i32>() {
            Ok(pid) if pid > 0 && is_alive(pid) => PidState::Alive(pid),
            _ => PidState::Stale,
        }
    }

    fn write_pid_file(&self, pid: i32) -> Result<()> {
        if let Some(parent) = self.config.pid_file.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config.pid_file, pid.to_string())?;
        Ok(())
    }

    fn remove_pid_file(&self) -> Result<()> {
        match fs::remove_file(&self.config.pid_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn append_log(&self, level: LogLevel, message: &str) {
        if let Err(e) = self.log.append(level, message) {
            warn!(path = %self.log.path().display(), error = %e, "bot: failed to write bot log");
        }
    }
}

fn is_alive(pid: i32) -> bool {
    // SAFETY: signal 0 performs only the existence and permission check.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

fn terminate(pid: i32) -> io::Result<()> {
    // SAFETY: plain kill(2) on a positive PID.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
