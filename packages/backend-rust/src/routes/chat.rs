use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use super::json_body;
use crate::orchestrator::{handle_message, ChatRequest};
use crate::response::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(chat))
}

/// Returns the turn unwrapped; clients read `response` and `ui_elements`
/// at the top level.
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let turn = handle_message(&state, request, Utc::now()).await?;
    Ok(Json(turn))
}
