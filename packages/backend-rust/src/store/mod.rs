//! Per-user study data behind a swappable store abstraction.

mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use prepcoach_algo::{AttemptRecord, DifficultyDistribution};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("quiz {0} not found")]
    QuizNotFound(String),
    #[error("quiz {0} was already submitted")]
    QuizConsumed(String),
    #[error("session {0} not found")]
    SessionNotFound(String),
}

// ==================== Records ====================

/// Learner profile. Scores are optional: nothing is invented for a learner
/// who has not provided them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub test_type: Option<String>,
    #[serde(default)]
    pub target_score: Option<u32>,
    #[serde(default)]
    pub baseline_score: Option<u32>,
    #[serde(default)]
    pub current_level: Option<String>,
    #[serde(default)]
    pub study_hours_per_week: Option<u32>,
    #[serde(default)]
    pub test_date: Option<NaiveDate>,
    #[serde(default)]
    pub preferences: BTreeMap<String, serde_json::Value>,
    /// Minutes east of UTC for calendar-day computations
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            email: None,
            test_type: None,
            target_score: None,
            baseline_score: None,
            current_level: None,
            study_hours_per_week: None,
            test_date: None,
            preferences: BTreeMap::new(),
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub score: u32,
    #[serde(default)]
    pub percentile: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeTestResult {
    pub test_id: String,
    pub test_type: String,
    pub total_score: u32,
    pub sections: BTreeMap<String, SectionScore>,
    pub date_taken: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub tools_used: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A generated quiz awaiting submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredQuiz {
    pub quiz_id: String,
    pub user_id: String,
    pub question_ids: Vec<String>,
    pub distribution: DifficultyDistribution,
    pub partial: bool,
    pub created_at: DateTime<Utc>,
}

/// Consistent view of one user's data taken under a single read lock.
#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub profile: UserProfile,
    /// Chronological, oldest first
    pub attempts: Vec<AttemptRecord>,
    /// Chronological, oldest first
    pub test_results: Vec<PracticeTestResult>,
}

/// Result of an append: the history length before it, and the user's data
/// as of the append, read under the same write lock.
#[derive(Debug, Clone)]
pub struct AppendedAttempts {
    pub previous_len: usize,
    pub snapshot: UserSnapshot,
}

/// In-place profile edit, run while the user record is exclusively locked.
pub type ProfileEdit = Box<dyn FnOnce(&mut UserProfile) + Send>;

// ==================== Store Trait ====================

#[async_trait]
pub trait StudyStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, StoreError>;

    /// Inserts or replaces a profile.
    async fn put_profile(&self, profile: UserProfile) -> Result<(), StoreError>;

    /// Applies `edit` to an existing profile and returns the updated data.
    async fn update_profile(
        &self,
        user_id: &str,
        edit: ProfileEdit,
    ) -> Result<UserSnapshot, StoreError>;

    async fn snapshot(&self, user_id: &str) -> Result<UserSnapshot, StoreError>;

    async fn append_attempts(
        &self,
        user_id: &str,
        attempts: Vec<AttemptRecord>,
    ) -> Result<AppendedAttempts, StoreError>;

    async fn append_test_result(
        &self,
        user_id: &str,
        result: PracticeTestResult,
    ) -> Result<(), StoreError>;

    async fn save_quiz(&self, quiz: StoredQuiz) -> Result<(), StoreError>;

    /// Looks up an open quiz owned by `user_id`; another user's quiz is not
    /// found and a submitted one is `QuizConsumed`.
    async fn get_quiz(&self, user_id: &str, quiz_id: &str) -> Result<StoredQuiz, StoreError>;

    /// Marks a quiz submitted. Fails with `QuizConsumed` the second time.
    async fn consume_quiz(&self, user_id: &str, quiz_id: &str) -> Result<StoredQuiz, StoreError>;

    /// Messages of a session owned by `user_id`, oldest first. An unknown
    /// session has no messages; another user's session is not found.
    async fn session_messages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, StoreError>;

    async fn append_messages(
        &self,
        user_id: &str,
        messages: Vec<ConversationMessage>,
    ) -> Result<(), StoreError>;
}
