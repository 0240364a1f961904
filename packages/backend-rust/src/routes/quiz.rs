use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use super::json_body;
use crate::response::{ok, AppError};
use crate::services::quiz::{self, GenerateQuizRequest, SubmitQuizRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:user_id/quiz/generate", post(generate))
        .route("/:user_id/quiz/submit", post(submit))
}

async fn generate(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<GenerateQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let quiz = quiz::generate(&state, &user_id, request, Utc::now()).await?;
    Ok(ok(quiz))
}

async fn submit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<SubmitQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let submission = quiz::submit(&state, &user_id, request, Utc::now()).await?;
    Ok(ok(submission))
}
