use std::sync::Arc;
use std::time::{Instant, SystemTime};

use prepcoach_algo::QuestionBank;

use crate::config::StudySettings;
use crate::services::llm_provider::ChatModel;
use crate::store::StudyStore;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    store: Arc<dyn StudyStore>,
    bank: Arc<QuestionBank>,
    model: Arc<dyn ChatModel>,
    settings: Arc<StudySettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn StudyStore>,
        bank: Arc<QuestionBank>,
        model: Arc<dyn ChatModel>,
        settings: StudySettings,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            store,
            bank,
            model,
            settings: Arc::new(settings),
        }
    }

    /// Same store and bank, different model.
    pub fn with_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = model;
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn store(&self) -> &dyn StudyStore {
        self.store.as_ref()
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn model(&self) -> Arc<dyn ChatModel> {
        Arc::clone(&self.model)
    }

    pub fn settings(&self) -> &StudySettings {
        &self.settings
    }
}
