//! Study recommendations
//!
//! Rule-based, prioritized suggestions built from a performance report plus
//! two calendar facts the caller supplies (days since the last attempt and
//! days until the test).

use serde::Serialize;

use crate::performance::{PerformanceReport, TopicPerformance};

/// Attempts a topic needs before it can be flagged as weak
pub const MIN_ATTEMPTS_FOR_WEAK_TOPIC: u32 = 5;
/// Accuracy below which a sufficiently practiced topic is weak
pub const WEAK_TOPIC_ACCURACY: f64 = 0.6;
pub const MAX_WEAK_TOPIC_ITEMS: usize = 3;
/// Days without practice before a consistency nudge
pub const INACTIVITY_DAYS: i64 = 3;
/// Test-prep item window, in days before the test
pub const TEST_PREP_WINDOW_DAYS: i64 = 30;
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Ordered most to least urgent
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    GetStarted,
    ImproveWeakTopic,
    Consistency,
    TestPrep,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub action: String,
    pub reason: String,
}

pub fn recommend(
    report: &PerformanceReport,
    days_since_last_attempt: Option<i64>,
    days_until_test: Option<i64>,
) -> Vec<Recommendation> {
    if report.total_attempted == 0 {
        return vec![Recommendation {
            priority: Priority::High,
            kind: RecommendationKind::GetStarted,
            topic: None,
            action: "Take a diagnostic quiz to assess your current level".to_string(),
            reason: "A first set of answers is needed to build a personalized study plan"
                .to_string(),
        }];
    }

    let mut items = Vec::new();

    if let Some(days) = days_until_test.filter(|d| (1..=TEST_PREP_WINDOW_DAYS).contains(d)) {
        items.push(Recommendation {
            priority: Priority::Critical,
            kind: RecommendationKind::TestPrep,
            topic: None,
            action: "Take full-length practice tests weekly".to_string(),
            reason: format!("Only {days} days until your test. Focus on test-taking strategies."),
        });
    }

    for (rank, topic) in weak_topics(report).into_iter().enumerate() {
        let percent = topic.accuracy.unwrap_or(0.0) * 100.0;
        items.push(Recommendation {
            priority: if rank == 0 { Priority::High } else { Priority::Medium },
            kind: RecommendationKind::ImproveWeakTopic,
            topic: Some(topic.topic.clone()),
            action: format!("Focus on {}: practice 10-15 questions daily", topic.topic),
            reason: format!("Current accuracy is {percent:.1}%, below target."),
        });
    }

    if let Some(days) = days_since_last_attempt.filter(|d| *d > INACTIVITY_DAYS) {
        items.push(Recommendation {
            priority: Priority::High,
            kind: RecommendationKind::Consistency,
            topic: None,
            action: "Resume daily practice, at least 20 minutes per day".to_string(),
            reason: format!("You haven't practiced in {days} days."),
        });
    }

    // Stable sort keeps insertion order within a priority
    items.sort_by_key(|item| item.priority);
    items.truncate(MAX_RECOMMENDATIONS);
    items
}

/// Weakest first; the report already orders topics by ascending accuracy.
fn weak_topics(report: &PerformanceReport) -> Vec<&TopicPerformance> {
    report
        .topics
        .iter()
        .filter(|t| t.attempted >= MIN_ATTEMPTS_FOR_WEAK_TOPIC)
        .filter(|t| t.accuracy.is_some_and(|a| a < WEAK_TOPIC_ACCURACY))
        .take(MAX_WEAK_TOPIC_ITEMS)
        .collect()
}
