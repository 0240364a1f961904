pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod question_bank;
pub mod response;
pub mod routes;
pub mod seed;
pub mod services;
pub mod state;
pub mod store;
pub mod tools;
pub mod ui;

use std::sync::Arc;

use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::question_bank::{load_question_bank, BankLoadError};
use crate::services::llm_provider::{LLMError, LLMProvider};
use crate::state::AppState;
use crate::store::{InMemoryStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("question bank: {0}")]
    Bank(#[from] BankLoadError),
    #[error("demo data: {0}")]
    Seed(#[from] StoreError),
    #[error("model client: {0}")]
    Model(#[from] LLMError),
}

/// Loads the question bank, prepares the store and the model client.
pub async fn build_state(config: &Config) -> Result<AppState, StartupError> {
    let bank = load_question_bank(config.question_bank_path.as_deref())?;
    let store = Arc::new(InMemoryStore::new());
    if config.seed_demo_data {
        seed::seed_demo_data(store.as_ref(), &bank, chrono::Utc::now()).await?;
        tracing::info!(user_id = seed::DEMO_USER_ID, "demo data seeded");
    }

    let provider = LLMProvider::from_env()?;
    if provider.is_available() {
        tracing::info!(model = provider.model_name(), "LLM provider configured");
    } else {
        tracing::warn!("LLM_API_KEY not set, chat requests will return an apology");
    }

    Ok(AppState::new(
        store,
        Arc::new(bank),
        Arc::new(provider),
        config.study.clone(),
    ))
}

pub fn build_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_app() -> Result<axum::Router, StartupError> {
    let config = Config::from_env();
    let state = build_state(&config).await?;
    Ok(build_app(state))
}
