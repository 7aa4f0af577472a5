use crate::bot::BotController;
use crate::handlers;
use botdeck_core::config::AdminConfig;
use botdeck_observability::BotLog;
use botdeck_plugin::PluginReconciler;
use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state for the admin API.
pub struct AdminState {
    pub reconciler: Arc<PluginReconciler>,
    pub bot: Arc<BotController>,
    pub bot_log: Arc<BotLog>,
}

/// Build the axum router with every admin route under `/api`.
pub fn build_admin_router(state: Arc<AdminState>) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(handlers::health::health_check))
        // Installed plugins
        .route(
            "/plugins/config",
            get(handlers::plugins::get_config)
                .post(handlers::plugins::post_config)
                .put(handlers::plugins::put_config)
                .delete(handlers::plugins::delete_config),
        )
        // Registry
        .route("/registry", get(handlers::registry::get_registry))
        // Bot
        .route("/logs", get(handlers::logs::get_logs))
        .route("/bot/status", get(handlers::bot::bot_status))
        .route("/bot/start", post(handlers::bot::start_bot))
        .route("/bot/stop", post(handlers::bot::stop_bot));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the admin API until `shutdown` resolves.
pub async fn start_admin(
    config: &AdminConfig,
    state: Arc<AdminState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    if !config.enabled {
        info!("Admin API disabled");
        return Ok(());
    }

    let app = build_admin_router(state);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(addr = %listener.local_addr()?, "Starting admin API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Admin API server stopped");
    Ok(())
}
