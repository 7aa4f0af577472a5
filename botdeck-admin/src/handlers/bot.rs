use super::{ApiResponse, ok, respond};
use crate::server::AdminState;
use axum::extract::State;
use std::sync::Arc;

pub async fn bot_status(State(state): State<Arc<AdminState>>) -> ApiResponse {
    ok(&state.bot.status())
}

pub async fn start_bot(State(state): State<Arc<AdminState>>) -> ApiResponse {
    respond(state.bot.start().await)
}

pub async fn stop_bot(State(state): State<Arc<AdminState>>) -> ApiResponse {
    respond(state.bot.stop().await)
}
