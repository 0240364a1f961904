use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use super::query_params;
use crate::response::{ok, AppError};
use crate::services::explanations::question_explanation;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:question_id/explanation", get(explanation))
}

#[derive(Debug, Deserialize)]
struct ExplanationQuery {
    detailed: Option<bool>,
}

async fn explanation(
    State(state): State<AppState>,
    Path(question_id): Path<String>,
    query: Result<Query<ExplanationQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let query = query_params(query)?;
    let explanation = question_explanation(&state, &question_id, query.detailed.unwrap_or(true))?;
    Ok(ok(explanation))
}
