use super::{ApiResponse, respond};
use crate::server::AdminState;
use axum::extract::State;
use std::sync::Arc;

/// Pass the registry manifest through so the UI can list what is available.
pub async fn get_registry(State(state): State<Arc<AdminState>>) -> ApiResponse {
    respond(state.reconciler.source().fetch_registry_manifest().await)
}
