//! Study operations shared by the HTTP routes and the chat tools.
//!
//! Each operation reads the user's stored history, runs the pure decision
//! logic from `prepcoach_algo`, and returns a serializable view. The current
//! time is passed in so results are reproducible.

pub mod explanations;
pub mod llm_provider;
pub mod motivation;
pub mod performance;
pub mod profile;
pub mod progress;
pub mod quiz;
pub mod recommendations;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use prepcoach_algo::{utc_offset, QuizError};
use thiserror::Error;

use crate::store::{StoreError, UserProfile};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

pub(crate) fn user_offset(profile: &UserProfile) -> FixedOffset {
    utc_offset(profile.utc_offset_minutes)
}

/// The user's local calendar date at `now`.
pub(crate) fn user_today(profile: &UserProfile, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&user_offset(profile)).date_naive()
}

pub(crate) fn days_until_test(profile: &UserProfile, now: DateTime<Utc>) -> Option<i64> {
    profile
        .test_date
        .map(|date| (date - user_today(profile, now)).num_days())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::llm_provider::{ChatMessage, ChatModel, LLMError, ModelReply};
    use crate::config::StudySettings;
    use crate::question_bank::builtin_bank;
    use crate::seed::seed_demo_data;
    use crate::state::AppState;
    use crate::store::{InMemoryStore, StudyStore, UserProfile};

    pub struct OfflineModel;

    #[async_trait]
    impl ChatModel for OfflineModel {
        async fn complete(&self, _: &[ChatMessage], _: &[Value]) -> Result<ModelReply, LLMError> {
            Err(LLMError::NotConfigured("LLM_API_KEY"))
        }
    }

    /// Built-in bank, seeded demo user, and an empty user `blank`.
    pub async fn seeded_state() -> AppState {
        let store = Arc::new(InMemoryStore::new());
        let bank = builtin_bank().unwrap();
        seed_demo_data(store.as_ref(), &bank, chrono::Utc::now())
            .await
            .unwrap();
        store.put_profile(UserProfile::new("blank")).await.unwrap();

        AppState::new(
            store,
            Arc::new(bank),
            Arc::new(OfflineModel),
            StudySettings::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_days_until_test_uses_local_date() {
        let mut profile = UserProfile::new("u1");
        profile.test_date = NaiveDate::from_ymd_opt(2025, 3, 11);
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 23, 30, 0).unwrap();

        assert_eq!(days_until_test(&profile, now), Some(10));
        profile.utc_offset_minutes = 60;
        assert_eq!(days_until_test(&profile, now), Some(9));
        profile.test_date = None;
        assert_eq!(days_until_test(&profile, now), None);
    }
}
