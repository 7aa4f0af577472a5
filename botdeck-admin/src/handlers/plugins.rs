//! `/api/plugins/config`: the installed-plugin document.
//!
//! Bodies are taken as raw JSON and decoded here so that shape errors come
//! back in the same `{success, error, kind}` form as every other failure.

use super::{ApiResponse, fail, ok, respond};
use crate::server::AdminState;
use axum::extract::{Query, State};
use axum::response::Json;
use botdeck_core::error::DeckError;
use botdeck_core::model::{AddPluginRequest, OperationResult, PluginConfig, PluginUpdate};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const ADD_PLUGIN_ACTION: &str = "add-plugin";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    #[serde(default)]
    plugin_name: String,
    #[serde(default)]
    updates: PluginUpdate,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveQuery {
    pub name: Option<String>,
}

pub async fn get_config(State(state): State<Arc<AdminState>>) -> ApiResponse {
    respond(state.reconciler.get_config().await)
}

/// `{"action": "add-plugin", "plugin": {..}}` installs one plugin; any other
/// body must be a full document with a `plugins` object and replaces the
/// stored one.
pub async fn post_config(
    State(state): State<Arc<AdminState>>,
    Json(body): Json<Value>,
) -> ApiResponse {
    if body.get("action").and_then(Value::as_str) == Some(ADD_PLUGIN_ACTION) {
        let plugin = body.get("plugin").cloned().unwrap_or(Value::Null);
        let request: AddPluginRequest = match serde_json::from_value(plugin) {
            Ok(request) => request,
            Err(e) => return fail(&DeckError::InvalidRequest(format!("invalid plugin data: {e}"))),
        };
        return match state.reconciler.add_plugin(request).await {
            Ok(outcome) => ok(&OperationResult::from(outcome)),
            Err(e) => fail(&e),
        };
    }

    if !body.get("plugins").is_some_and(Value::is_object) {
        return fail(&DeckError::InvalidConfig("plugins object is required".into()));
    }
    let config: PluginConfig = match serde_json::from_value(body) {
        Ok(config) => config,
        Err(e) => {
            return fail(&DeckError::InvalidConfig(format!("invalid plugin structure: {e}")));
        }
    };
    match state.reconciler.replace_config(config).await {
        Ok(_) => ok(&OperationResult::ok("Configuration saved successfully")),
        Err(e) => fail(&e),
    }
}

pub async fn put_config(
    State(state): State<Arc<AdminState>>,
    Json(body): Json<Value>,
) -> ApiResponse {
    let body: UpdateBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(e) => return fail(&DeckError::InvalidRequest(format!("invalid update: {e}"))),
    };
    let name = body.plugin_name.trim();
    if name.is_empty() {
        return fail(&DeckError::InvalidRequest("Plugin name is required".into()));
    }
    match state.reconciler.update_plugin(name, body.updates).await {
        Ok(view) => ok(&OperationResult::from(view)),
        Err(e) => fail(&e),
    }
}

pub async fn delete_config(
    State(state): State<Arc<AdminState>>,
    Query(query): Query<RemoveQuery>,
) -> ApiResponse {
    let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        return fail(&DeckError::InvalidRequest("Plugin name is required".into()));
    };
    match state.reconciler.remove_plugin(name).await {
        Ok(outcome) => ok(&OperationResult::from(outcome)),
        Err(e) => fail(&e),
    }
}
