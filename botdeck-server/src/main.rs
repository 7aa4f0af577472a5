// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  botdeck: admin backend for a chat bot
//
//  Admin API:  axum on tokio
//  Plugins:    remote static registry + local YAML document
//  Bot:        PID-file process control, plain-text log tail
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use anyhow::Context;
use botdeck_admin::{AdminState, BotController};
use botdeck_core::config::DashboardConfig;
use botdeck_observability::BotLog;
use botdeck_plugin::{PluginReconciler, RegistryClient};
use botdeck_store::ConfigStore;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "botdeck", version, about = "botdeck: chat bot admin backend")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "botdeck.yaml")]
    config: PathBuf,

    /// Log level; overrides `logging.level` from the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Installed-plugin document; overrides `store.path`
    #[arg(long)]
    store: Option<PathBuf>,

    /// Admin API listen address; overrides `admin.addr`
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Config ──
    let config_exists = cli.config.exists();
    let mut config = if config_exists {
        DashboardConfig::load(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        DashboardConfig::default()
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(store) = cli.store {
        config.store.path = store;
    }
    if let Some(addr) = cli.addr {
        config.admin.addr = addr;
    }

    // ── Tracing ──
    init_tracing(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "botdeck starting");
    if config_exists {
        info!(path = %cli.config.display(), "Loaded config file");
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults");
    }

    // ── Plugins ──
    let registry = RegistryClient::new(&config.registry)?;
    info!(
        registry = registry.base_url(),
        timeout_ms = config.registry.timeout_ms,
        "Plugin registry configured"
    );
    let store = Arc::new(ConfigStore::new(config.store.path.clone()));
    let reconciler = Arc::new(PluginReconciler::new(Arc::new(registry), store));
    info!(path = %config.store.path.display(), "Plugin config store ready");

    // ── Bot ──
    let bot_log = Arc::new(BotLog::open(&config.bot.log_file)?);
    let bot = Arc::new(BotController::new(
        config.bot.clone(),
        BotLog::open(&config.bot.log_file)?,
    ));
    let bot_status = bot.status();
    info!(
        command = %config.bot.command,
        running = bot_status.is_running(),
        pid = ?bot_status.pid,
        "Bot controller ready"
    );

    // ── Admin API ──
    let state = Arc::new(AdminState {
        reconciler,
        bot,
        bot_log,
    });
    botdeck_admin::start_admin(&config.admin, state, shutdown_signal()).await?;

    info!("botdeck stopped");
    Ok(())
}

fn init_tracing(config: &DashboardConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping...");
}
