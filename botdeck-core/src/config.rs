use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_addr")]
    pub addr: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Remote plugin registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL; `plugins.json` and `<name>/<version>/metadata.json` hang off it.
    #[serde(default = "default_registry_url")]
    pub base_url: String,
    /// Upper bound for every registry request.
    #[serde(default = "default_registry_timeout")]
    pub timeout_ms: u64,
}

/// Installed-plugin document location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// How the bot process is launched and tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_command")]
    pub command: String,
    #[serde(default = "default_bot_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_admin_addr() -> String { "0.0.0.0:3000".into() }
fn default_true() -> bool { true }
fn default_registry_url() -> String {
    "https://raw.githubusercontent.com/Celarye/discord-bot-plugins/refs/heads/master".into()
}
fn default_registry_timeout() -> u64 { 10_000 }
fn default_store_path() -> PathBuf { PathBuf::from("config.yaml") }
fn default_bot_command() -> String { "node".into() }
fn default_bot_args() -> Vec<String> { vec!["./bot/index.js".into()] }
fn default_pid_file() -> PathBuf { PathBuf::from("bot.pid") }
fn default_log_file() -> PathBuf { PathBuf::from("logs/bot.log") }
fn default_log_level() -> String { "info".into() }

// ── Impls ─────────────────────────────────────────────────────

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            addr: default_admin_addr(),
            enabled: true,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_url(),
            timeout_ms: default_registry_timeout(),
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command: default_bot_command(),
            args: default_bot_args(),
            working_dir: None,
            pid_file: default_pid_file(),
            log_file: default_log_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl DashboardConfig {
    /// Load configuration from YAML file + `BOTDECK_` env overrides.
    ///
    /// Nested keys are separated by a double underscore, e.g.
    /// `BOTDECK_REGISTRY__TIMEOUT_MS=5000`.
    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("BOTDECK_").split("__"))
            .extract()
    }
}
