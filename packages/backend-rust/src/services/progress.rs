use chrono::{DateTime, Duration, NaiveDate, Utc};
use prepcoach_algo::{
    aggregate, as_percent, evaluate_milestones, streak_report, Milestone, StreakReport, Tally,
    Trend,
};
use serde::Serialize;

use super::performance::TopicView;
use super::profile::current_score;
use super::{days_until_test, user_offset, user_today, ServiceError};
use crate::state::AppState;
use crate::store::UserSnapshot;

const AREA_COUNT: usize = 3;
pub const DEFAULT_HISTORY_DAYS: u32 = 30;
pub const MAX_HISTORY_DAYS: u32 = 365;

// ==================== Streak ====================

#[derive(Debug, Clone, Serialize)]
pub struct StreakView {
    #[serde(flatten)]
    pub report: StreakReport,
    /// Length of the current run if it is still alive, else 0
    pub current_streak: u32,
    pub longest_streak: u32,
    pub streak_status: &'static str,
    pub message: String,
}

fn streak_status(days: u32) -> &'static str {
    match days {
        0 => "Start your streak today!",
        1..=2 => "💪 Keep going!",
        3..=6 => "⭐ Great start!",
        _ => "🔥 On fire!",
    }
}

fn streak_message(days: u32) -> String {
    match days {
        0 => "Start your study streak today! Even 10 minutes counts.".to_string(),
        1 => "Great start! Come back tomorrow to build your streak.".to_string(),
        2..=6 => format!("{days} days strong! Keep the momentum going."),
        7..=29 => format!("Amazing {days}-day streak! You're building a solid habit."),
        _ => format!("Incredible {days}-day streak! Your dedication is inspiring."),
    }
}

pub fn streak_view(snapshot: &UserSnapshot, today: NaiveDate) -> StreakView {
    let report = streak_report(&snapshot.attempts, user_offset(&snapshot.profile), today);
    let current_streak = if report.active {
        report.current_length()
    } else {
        0
    };
    StreakView {
        current_streak,
        longest_streak: report.longest.map_or(0, |run| run.length),
        streak_status: streak_status(current_streak),
        message: streak_message(current_streak),
        report,
    }
}

pub async fn track_streak(
    state: &AppState,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<StreakView, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    let today = user_today(&snapshot.profile, now);
    Ok(streak_view(&snapshot, today))
}

// ==================== Summary ====================

#[derive(Debug, Clone, Serialize)]
pub struct ScorePoint {
    pub date: DateTime<Utc>,
    pub score: u32,
    pub test_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressSummary {
    pub user_id: String,
    pub test_type: Option<String>,
    pub target_score: Option<u32>,
    pub baseline_score: Option<u32>,
    pub current_score: Option<u32>,
    pub days_until_test: Option<i64>,
    pub total_questions_attempted: u32,
    pub overall_accuracy: Option<f64>,
    pub recent_accuracy: Option<f64>,
    pub trend: Option<Trend>,
    pub streak: StreakView,
    pub milestones: Vec<Milestone>,
    /// Weakest first
    pub weak_areas: Vec<TopicView>,
    /// Strongest first
    pub strong_areas: Vec<TopicView>,
    pub score_progression: Vec<ScorePoint>,
}

pub fn summarize(state: &AppState, snapshot: &UserSnapshot, now: DateTime<Utc>) -> ProgressSummary {
    let profile = &snapshot.profile;
    let report = aggregate(&snapshot.attempts, state.bank(), &state.settings().aggregator);
    let milestones = evaluate_milestones(
        &snapshot.attempts,
        user_offset(profile),
        snapshot.attempts.len(),
    );

    let weak_areas = report.topics.iter().take(AREA_COUNT).map(TopicView::from).collect();
    let strong_areas = report
        .topics
        .iter()
        .rev()
        .take(AREA_COUNT)
        .map(TopicView::from)
        .collect();

    ProgressSummary {
        user_id: profile.user_id.clone(),
        test_type: profile.test_type.clone(),
        target_score: profile.target_score,
        baseline_score: profile.baseline_score,
        current_score: current_score(snapshot),
        days_until_test: days_until_test(profile, now),
        total_questions_attempted: report.total_attempted,
        overall_accuracy: as_percent(report.overall_accuracy),
        recent_accuracy: as_percent(report.recent_accuracy),
        trend: report.trend,
        streak: streak_view(snapshot, user_today(profile, now)),
        milestones: milestones.achieved,
        weak_areas,
        strong_areas,
        score_progression: snapshot
            .test_results
            .iter()
            .map(|t| ScorePoint {
                date: t.date_taken,
                score: t.total_score,
                test_type: t.test_type.clone(),
            })
            .collect(),
    }
}

pub async fn progress_summary(
    state: &AppState,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<ProgressSummary, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    Ok(summarize(state, &snapshot, now))
}

// ==================== Learning History ====================

#[derive(Debug, Clone, Serialize)]
pub struct LearningHistory {
    pub period_days: u32,
    pub total_questions_attempted: u32,
    pub correct_answers: u32,
    pub accuracy: Option<f64>,
    pub topics_practiced: usize,
    pub topic_breakdown: Vec<TopicView>,
    pub streak: StreakView,
}

pub async fn learning_history(
    state: &AppState,
    user_id: &str,
    days: Option<u32>,
    now: DateTime<Utc>,
) -> Result<LearningHistory, ServiceError> {
    let days = days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if days == 0 || days > MAX_HISTORY_DAYS {
        return Err(ServiceError::Validation(format!(
            "days must be between 1 and {MAX_HISTORY_DAYS}"
        )));
    }

    let snapshot = state.store().snapshot(user_id).await?;
    let cutoff = now - Duration::days(i64::from(days));
    let window: Vec<_> = snapshot
        .attempts
        .iter()
        .filter(|a| a.timestamp >= cutoff)
        .cloned()
        .collect();

    let tally = Tally::from_attempts(&window);
    let report = aggregate(&window, state.bank(), &state.settings().aggregator);

    Ok(LearningHistory {
        period_days: days,
        total_questions_attempted: tally.attempted,
        correct_answers: tally.correct,
        accuracy: as_percent(tally.accuracy()),
        topics_practiced: report.topics.len(),
        topic_breakdown: report.topics.iter().map(TopicView::from).collect(),
        streak: streak_view(&snapshot, user_today(&snapshot.profile, now)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::DEMO_USER_ID;
    use crate::services::test_support::seeded_state;

    #[test]
    fn test_streak_copy() {
        assert_eq!(streak_status(0), "Start your streak today!");
        assert_eq!(streak_status(3), "⭐ Great start!");
        assert_eq!(streak_status(7), "🔥 On fire!");
        assert_eq!(streak_message(1), "Great start! Come back tomorrow to build your streak.");
        assert_eq!(streak_message(12), "Amazing 12-day streak! You're building a solid habit.");
    }

    #[tokio::test]
    async fn test_demo_streak_is_alive() {
        let state = seeded_state().await;
        let view = track_streak(&state, DEMO_USER_ID, Utc::now()).await.unwrap();
        assert_eq!(view.current_streak, 10);
        assert_eq!(view.longest_streak, 10);
        assert_eq!(view.report.study_days, 10);
        assert!(view.report.active);
    }

    #[tokio::test]
    async fn test_stale_streak_reports_zero_current() {
        let state = seeded_state().await;
        let later = Utc::now() + Duration::days(5);
        let view = track_streak(&state, DEMO_USER_ID, later).await.unwrap();
        assert_eq!(view.current_streak, 0);
        assert_eq!(view.longest_streak, 10);
    }

    #[tokio::test]
    async fn test_summary_for_empty_user() {
        let state = seeded_state().await;
        let summary = progress_summary(&state, "blank", Utc::now()).await.unwrap();
        assert_eq!(summary.total_questions_attempted, 0);
        assert_eq!(summary.overall_accuracy, None);
        assert_eq!(summary.current_score, None);
        assert!(summary.milestones.is_empty());
        assert!(summary.weak_areas.is_empty());
    }

    #[tokio::test]
    async fn test_summary_for_demo_user() {
        let state = seeded_state().await;
        let summary = progress_summary(&state, DEMO_USER_ID, Utc::now()).await.unwrap();
        assert_eq!(summary.total_questions_attempted, 10);
        assert_eq!(summary.current_score, Some(800));
        assert!(summary.weak_areas.len() <= 3);
        assert!(summary.milestones.iter().any(|m| m.key == "volume:10"));
        assert_eq!(summary.score_progression.len(), 1);
    }

    #[tokio::test]
    async fn test_history_window_validation() {
        let state = seeded_state().await;
        assert!(matches!(
            learning_history(&state, DEMO_USER_ID, Some(0), Utc::now()).await,
            Err(ServiceError::Validation(_))
        ));
        let history = learning_history(&state, DEMO_USER_ID, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(history.period_days, 30);
        assert_eq!(history.total_questions_attempted, 10);
    }
}
