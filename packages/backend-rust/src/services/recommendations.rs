use chrono::{DateTime, Utc};
use prepcoach_algo::{aggregate, recommend, Recommendation};
use serde::Serialize;

use super::{days_until_test, user_offset, user_today, ServiceError};
use crate::state::AppState;
use crate::store::UserSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct StudyRecommendations {
    pub recommendations: Vec<Recommendation>,
    pub days_since_last_attempt: Option<i64>,
    pub days_until_test: Option<i64>,
}

/// Calendar days between the last attempt and today, in the user's timezone.
fn days_since_last_attempt(snapshot: &UserSnapshot, now: DateTime<Utc>) -> Option<i64> {
    let offset = user_offset(&snapshot.profile);
    let last = snapshot.attempts.iter().map(|a| a.timestamp).max()?;
    let last_day = last.with_timezone(&offset).date_naive();
    Some((user_today(&snapshot.profile, now) - last_day).num_days())
}

pub fn build(state: &AppState, snapshot: &UserSnapshot, now: DateTime<Utc>) -> StudyRecommendations {
    let report = aggregate(&snapshot.attempts, state.bank(), &state.settings().aggregator);
    let since_last = days_since_last_attempt(snapshot, now);
    let until_test = days_until_test(&snapshot.profile, now);

    StudyRecommendations {
        recommendations: recommend(&report, since_last, until_test),
        days_since_last_attempt: since_last,
        days_until_test: until_test,
    }
}

pub async fn study_recommendations(
    state: &AppState,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<StudyRecommendations, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    Ok(build(state, &snapshot, now))
}
