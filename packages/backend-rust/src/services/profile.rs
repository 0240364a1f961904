use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{days_until_test, ServiceError};
use crate::state::AppState;
use crate::store::{UserProfile, UserSnapshot};

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
const MAX_STUDY_HOURS_PER_WEEK: u32 = 168;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub days_until_test: Option<i64>,
    /// Latest practice test total, else the baseline
    pub current_score: Option<u32>,
}

impl ProfileView {
    pub fn from_snapshot(snapshot: &UserSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            days_until_test: days_until_test(&snapshot.profile, now),
            current_score: current_score(snapshot),
            profile: snapshot.profile.clone(),
        }
    }
}

pub(crate) fn current_score(snapshot: &UserSnapshot) -> Option<u32> {
    snapshot
        .test_results
        .last()
        .map(|t| t.total_score)
        .or(snapshot.profile.baseline_score)
}

/// Partial profile update. `user_id` and `email` are not updatable and are
/// ignored if present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub test_type: Option<String>,
    pub target_score: Option<u32>,
    pub baseline_score: Option<u32>,
    pub current_level: Option<String>,
    pub study_hours_per_week: Option<u32>,
    pub test_date: Option<NaiveDate>,
    pub preferences: Option<BTreeMap<String, Value>>,
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdateResult {
    pub profile: ProfileView,
    pub updated_fields: Vec<&'static str>,
}

pub async fn get_profile(
    state: &AppState,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<ProfileView, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    Ok(ProfileView::from_snapshot(&snapshot, now))
}

pub async fn update_profile(
    state: &AppState,
    user_id: &str,
    update: ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<ProfileUpdateResult, ServiceError> {
    update.validate()?;
    let updated_fields = update.field_names();
    let snapshot = state
        .store()
        .update_profile(user_id, Box::new(move |profile| update.apply(profile)))
        .await?;

    tracing::info!(user_id, fields = ?updated_fields, "profile updated");

    Ok(ProfileUpdateResult {
        profile: ProfileView::from_snapshot(&snapshot, now),
        updated_fields,
    })
}

/// Validates the whole update before touching the profile.
pub fn apply_update(
    profile: &mut UserProfile,
    update: ProfileUpdate,
) -> Result<Vec<&'static str>, ServiceError> {
    update.validate()?;
    let fields = update.field_names();
    update.apply(profile);
    Ok(fields)
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(offset) = self.utc_offset_minutes {
            if offset.abs() > MAX_UTC_OFFSET_MINUTES {
                return Err(ServiceError::Validation(format!(
                    "utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
                )));
            }
        }
        if let Some(hours) = self.study_hours_per_week {
            if hours > MAX_STUDY_HOURS_PER_WEEK {
                return Err(ServiceError::Validation(format!(
                    "study_hours_per_week must be at most {MAX_STUDY_HOURS_PER_WEEK}"
                )));
            }
        }
        if self.target_score == Some(0) {
            return Err(ServiceError::Validation("target_score must be positive".to_string()));
        }
        Ok(())
    }

    /// Names of the fields this update sets, in profile order.
    pub fn field_names(&self) -> Vec<&'static str> {
        [
            ("name", self.name.is_some()),
            ("test_type", self.test_type.is_some()),
            ("target_score", self.target_score.is_some()),
            ("baseline_score", self.baseline_score.is_some()),
            ("current_level", self.current_level.is_some()),
            ("study_hours_per_week", self.study_hours_per_week.is_some()),
            ("test_date", self.test_date.is_some()),
            ("preferences", self.preferences.is_some()),
            ("utc_offset_minutes", self.utc_offset_minutes.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }

    /// Writes every set field. Call [`ProfileUpdate::validate`] first.
    fn apply(self, profile: &mut UserProfile) {
        if let Some(name) = self.name {
            profile.name = Some(name);
        }
        if let Some(test_type) = self.test_type {
            profile.test_type = Some(test_type);
        }
        if let Some(score) = self.target_score {
            profile.target_score = Some(score);
        }
        if let Some(score) = self.baseline_score {
            profile.baseline_score = Some(score);
        }
        if let Some(level) = self.current_level {
            profile.current_level = Some(level);
        }
        if let Some(hours) = self.study_hours_per_week {
            profile.study_hours_per_week = Some(hours);
        }
        if let Some(date) = self.test_date {
            profile.test_date = Some(date);
        }
        if let Some(preferences) = self.preferences {
            profile.preferences.extend(preferences);
        }
        if let Some(offset) = self.utc_offset_minutes {
            profile.utc_offset_minutes = offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::DEMO_USER_ID;
    use crate::services::test_support::seeded_state;
    use crate::store::StoreError;

    #[test]
    fn test_ignores_identity_fields() {
        let mut profile = UserProfile::new("u1");
        profile.email = Some("a@example.com".to_string());
        let update: ProfileUpdate = serde_json::from_value(serde_json::json!({
            "user_id": "someone-else",
            "email": "b@example.com",
            "target_score": 1500
        }))
        .unwrap();

        let fields = apply_update(&mut profile, update).unwrap();
        assert_eq!(fields, vec!["target_score"]);
        assert_eq!(profile.user_id, "u1");
        assert_eq!(profile.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_invalid_offset_leaves_profile_untouched() {
        let mut profile = UserProfile::new("u1");
        let update = ProfileUpdate {
            name: Some("Kim".to_string()),
            utc_offset_minutes: Some(2000),
            ..Default::default()
        };
        assert!(matches!(
            apply_update(&mut profile, update),
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(profile.name, None);
    }

    #[tokio::test]
    async fn test_profile_view_reports_null_scores() {
        let state = seeded_state().await;
        let view = get_profile(&state, "blank", Utc::now()).await.unwrap();
        assert_eq!(view.current_score, None);
        assert_eq!(view.days_until_test, None);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["target_score"].is_null());
        assert_eq!(json["user_id"], "blank");
    }

    #[tokio::test]
    async fn test_current_score_from_latest_test() {
        let state = seeded_state().await;
        let view = get_profile(&state, DEMO_USER_ID, Utc::now()).await.unwrap();
        assert_eq!(view.current_score, Some(800));
        assert_eq!(view.days_until_test, Some(90));
    }

    #[tokio::test]
    async fn test_update_unknown_user_is_not_found() {
        let state = seeded_state().await;
        let err = update_profile(&state, "ghost", ProfileUpdate::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::UserNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_keep_both_fields() {
        let state = seeded_state().await;
        let mut tasks = Vec::new();
        for i in 0..16u32 {
            let state = state.clone();
            tasks.push(tokio::spawn(async move {
                let update = if i % 2 == 0 {
                    ProfileUpdate {
                        target_score: Some(1200 + i),
                        ..Default::default()
                    }
                } else {
                    ProfileUpdate {
                        preferences: Some(BTreeMap::from([(format!("pref-{i}"), Value::Bool(true))])),
                        ..Default::default()
                    }
                };
                update_profile(&state, "blank", update, Utc::now()).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let profile = state.store().get_profile("blank").await.unwrap();
        assert!(profile.target_score.is_some());
        assert_eq!(profile.preferences.len(), 8);
    }

    #[tokio::test]
    async fn test_rejected_update_changes_nothing() {
        let state = seeded_state().await;
        let before = state.store().get_profile(DEMO_USER_ID).await.unwrap();
        let update = ProfileUpdate {
            name: Some("Kim".to_string()),
            study_hours_per_week: Some(500),
            ..Default::default()
        };
        assert!(matches!(
            update_profile(&state, DEMO_USER_ID, update, Utc::now()).await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(state.store().get_profile(DEMO_USER_ID).await.unwrap(), before);
    }
}
