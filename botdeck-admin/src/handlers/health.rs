use crate::server::AdminState;
use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

pub async fn health_check(State(state): State<Arc<AdminState>>) -> Json<Value> {
    let path = state.reconciler.store().path();
    let meta = std::fs::metadata(path).ok();
    let last_modified_unix = meta
        .as_ref()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": {
            "path": path.to_string_lossy(),
            "file_exists": meta.is_some(),
            "size_bytes": meta.as_ref().map(|m| m.len()),
            "last_modified_unix": last_modified_unix,
        },
        "bot": state.bot.status().status,
    }))
}
