#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

use prepcoach_backend::build_app;
use prepcoach_backend::config::StudySettings;
use prepcoach_backend::question_bank::builtin_bank;
use prepcoach_backend::seed::seed_demo_data;
use prepcoach_backend::services::llm_provider::{ChatMessage, ChatModel, LLMError, ModelReply};
use prepcoach_backend::state::AppState;
use prepcoach_backend::store::InMemoryStore;

/// Plays back canned replies in order; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage], _tools: &[Value]) -> Result<ModelReply, LLMError> {
        self.requests.lock().push(messages.to_vec());
        self.replies
            .lock()
            .pop_front()
            .ok_or(LLMError::NotConfigured("LLM_API_KEY"))
    }
}

pub async fn create_test_state(model: Arc<ScriptedModel>) -> AppState {
    let store = Arc::new(InMemoryStore::new());
    let bank = builtin_bank().unwrap();
    seed_demo_data(store.as_ref(), &bank, chrono::Utc::now())
        .await
        .unwrap();
    AppState::new(store, Arc::new(bank), model, StudySettings::default())
}

pub async fn create_test_app() -> Router {
    build_app(create_test_state(ScriptedModel::new(Vec::new())).await)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
