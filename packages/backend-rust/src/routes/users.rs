use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use prepcoach_algo::Timeframe;
use serde::Deserialize;

use super::{json_body, query_params};
use crate::orchestrator::get_session_summary;
use crate::response::{ok, AppError};
use crate::services::profile::{self, ProfileUpdate};
use crate::services::{performance, progress, recommendations};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:user_id/profile", get(get_profile).put(update_profile))
        .route("/:user_id/performance", get(topic_performance))
        .route("/:user_id/progress", get(progress_summary))
        .route("/:user_id/streak", get(streak))
        .route("/:user_id/recommendations", get(study_recommendations))
        .route("/:user_id/sessions/:session_id", get(session_summary))
}

async fn session_summary(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let summary = get_session_summary(&state, &user_id, &session_id).await?;
    Ok(ok(summary))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = profile::get_profile(&state, &user_id, Utc::now()).await?;
    Ok(ok(view))
}

async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let update = json_body(payload)?;
    let result = profile::update_profile(&state, &user_id, update, Utc::now()).await?;
    Ok(ok(result))
}

#[derive(Debug, Deserialize)]
struct PerformanceQuery {
    timeframe: Option<Timeframe>,
    section: Option<String>,
}

async fn topic_performance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: Result<Query<PerformanceQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let query = query_params(query)?;
    let section = query.section.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let analysis = performance::analyze_by_topic(
        &state,
        &user_id,
        query.timeframe.unwrap_or_default(),
        section,
        Utc::now(),
    )
    .await?;
    Ok(ok(analysis))
}

async fn progress_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = progress::progress_summary(&state, &user_id, Utc::now()).await?;
    Ok(ok(summary))
}

async fn streak(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = progress::track_streak(&state, &user_id, Utc::now()).await?;
    Ok(ok(view))
}

async fn study_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let recs = recommendations::study_recommendations(&state, &user_id, Utc::now()).await?;
    Ok(ok(recs))
}
