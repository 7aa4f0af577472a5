pub mod bot;
pub mod health;
pub mod logs;
pub mod plugins;
pub mod registry;

use axum::http::StatusCode;
use axum::response::Json;
use botdeck_core::error::DeckError;
use botdeck_core::model::OperationResult;
use serde::Serialize;
use serde_json::Value;

/// Status plus JSON body; every handler answers with this.
pub type ApiResponse = (StatusCode, Json<Value>);

pub(crate) fn ok<T: Serialize>(body: &T) -> ApiResponse {
    (StatusCode::OK, Json(serde_json::to_value(body).unwrap_or(Value::Null)))
}

pub(crate) fn fail(err: &DeckError) -> ApiResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(kind = err.kind(), error = %err, "admin: request failed");
    } else {
        tracing::debug!(kind = err.kind(), error = %err, "admin: request rejected");
    }
    let body = OperationResult::failure(err);
    (status, Json(serde_json::to_value(body).unwrap_or(Value::Null)))
}

pub(crate) fn respond<T: Serialize>(result: botdeck_core::Result<T>) -> ApiResponse {
    match result {
        Ok(body) => ok(&body),
        Err(e) => fail(&e),
    }
}
