use super::{ApiResponse, fail, ok};
use crate::server::AdminState;
use axum::extract::{Query, State};
use botdeck_core::error::DeckError;
use botdeck_observability::LogLevel;
use botdeck_observability::bot_log::DEFAULT_LIMIT;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub level: Option<String>,
    pub limit: Option<String>,
}

/// `level=all` (or no level) returns every level; a limit that is missing,
/// zero or not a number falls back to the default.
pub async fn get_logs(
    State(state): State<Arc<AdminState>>,
    Query(query): Query<LogQuery>,
) -> ApiResponse {
    let level = match query.level.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => match raw.parse::<LogLevel>() {
            Ok(level) => Some(level),
            Err(e) => return fail(&DeckError::InvalidRequest(e)),
        },
    };
    let limit = query
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<usize>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT);

    match state.bot_log.read(level, limit) {
        Ok(logs) => ok(&json!({ "logs": logs })),
        Err(e) => fail(&DeckError::Io(e)),
    }
}
