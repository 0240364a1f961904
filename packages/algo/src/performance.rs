//! Performance Aggregator
//!
//! Derives per-topic and overall accuracy from raw attempt history, plus a
//! recent-window accuracy used for trend detection. Nothing here is cached:
//! every figure is recomputed from attempt counts on each call.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AttemptRecord, QuestionBank, Tally};

// ==================== Constants ====================

/// Default size of the recent-accuracy window (attempts)
pub const DEFAULT_RECENT_WINDOW: usize = 15;

// ==================== Config ====================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Number of most recent attempts used for recent accuracy
    pub recent_window: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }
}

// ==================== Report Types ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    NeedsFocus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubtopicPerformance {
    pub subtopic: String,
    pub attempted: u32,
    pub correct: u32,
    pub accuracy: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TopicPerformance {
    pub topic: String,
    pub attempted: u32,
    pub correct: u32,
    pub accuracy: Option<f64>,
    /// Weakest first
    pub subtopics: Vec<SubtopicPerformance>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub total_attempted: u32,
    pub total_correct: u32,
    pub overall_accuracy: Option<f64>,
    pub recent_attempted: u32,
    pub recent_correct: u32,
    pub recent_accuracy: Option<f64>,
    /// Undefined while there is no history
    pub trend: Option<Trend>,
    /// Weakest first
    pub topics: Vec<TopicPerformance>,
    /// Attempts whose question is not in the bank; counted overall only
    pub unclassified_attempts: u32,
}

impl PerformanceReport {
    pub fn topic(&self, topic: &str) -> Option<&TopicPerformance> {
        self.topics.iter().find(|t| t.topic == topic)
    }
}

// ==================== Aggregation ====================

/// Aggregate a chronological attempt history against the bank taxonomy.
pub fn aggregate(
    attempts: &[AttemptRecord],
    bank: &QuestionBank,
    config: &AggregatorConfig,
) -> PerformanceReport {
    let overall = Tally::from_attempts(attempts);
    let recent = recent_tally(attempts, config.recent_window);

    let mut topics: BTreeMap<&str, (Tally, BTreeMap<&str, Tally>)> = BTreeMap::new();
    let mut unclassified = 0u32;

    for attempt in attempts {
        let Some(question) = bank.get(&attempt.question_id) else {
            unclassified += 1;
            continue;
        };
        let entry = topics.entry(question.topic.as_str()).or_default();
        entry.0.record(attempt.is_correct);
        entry
            .1
            .entry(question.subtopic.as_str())
            .or_default()
            .record(attempt.is_correct);
    }

    let mut topics: Vec<TopicPerformance> = topics
        .into_iter()
        .map(|(topic, (tally, subtopics))| {
            let mut subtopics: Vec<SubtopicPerformance> = subtopics
                .into_iter()
                .map(|(subtopic, sub)| SubtopicPerformance {
                    subtopic: subtopic.to_string(),
                    attempted: sub.attempted,
                    correct: sub.correct,
                    accuracy: sub.accuracy(),
                })
                .collect();
            subtopics.sort_by(|a, b| weakest_first(a.accuracy, b.accuracy));
            TopicPerformance {
                topic: topic.to_string(),
                attempted: tally.attempted,
                correct: tally.correct,
                accuracy: tally.accuracy(),
                subtopics,
            }
        })
        .collect();
    topics.sort_by(|a, b| {
        weakest_first(a.accuracy, b.accuracy).then_with(|| b.attempted.cmp(&a.attempted))
    });

    PerformanceReport {
        total_attempted: overall.attempted,
        total_correct: overall.correct,
        overall_accuracy: overall.accuracy(),
        recent_attempted: recent.attempted,
        recent_correct: recent.correct,
        recent_accuracy: recent.accuracy(),
        trend: classify_trend(recent, overall),
        topics,
        unclassified_attempts: unclassified,
    }
}

/// Tally of the last `window` attempts (fewer if the history is shorter).
pub fn recent_tally(attempts: &[AttemptRecord], window: usize) -> Tally {
    let start = attempts.len().saturating_sub(window);
    Tally::from_attempts(&attempts[start..])
}

/// Per-topic tallies; the input to weak-topic weighting.
pub fn topic_tallies(attempts: &[AttemptRecord], bank: &QuestionBank) -> BTreeMap<String, Tally> {
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
    for attempt in attempts {
        if let Some(question) = bank.get(&attempt.question_id) {
            tallies
                .entry(question.topic.clone())
                .or_default()
                .record(attempt.is_correct);
        }
    }
    tallies
}

/// Compares recent against overall accuracy exactly (cross-multiplied counts),
/// so equal ratios from different sample sizes are a tie and resolve to stable.
pub fn classify_trend(recent: Tally, overall: Tally) -> Option<Trend> {
    if recent.attempted == 0 || overall.attempted == 0 {
        return None;
    }
    let lhs = recent.correct as u64 * overall.attempted as u64;
    let rhs = overall.correct as u64 * recent.attempted as u64;
    Some(match lhs.cmp(&rhs) {
        Ordering::Greater => Trend::Improving,
        Ordering::Less => Trend::NeedsFocus,
        Ordering::Equal => Trend::Stable,
    })
}

fn weakest_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ==================== Filters ====================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Week,
    Month,
    #[default]
    All,
}

impl Timeframe {
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::Week => Some(now - Duration::days(7)),
            Timeframe::Month => Some(now - Duration::days(30)),
            Timeframe::All => None,
        }
    }
}

/// Attempts inside the timeframe and, when given, belonging to `section`.
/// Section filtering drops attempts whose question is unknown to the bank.
pub fn filter_attempts(
    attempts: &[AttemptRecord],
    bank: &QuestionBank,
    timeframe: Timeframe,
    section: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<AttemptRecord> {
    let cutoff = timeframe.cutoff(now);
    attempts
        .iter()
        .filter(|a| cutoff.map_or(true, |c| a.timestamp >= c))
        .filter(|a| match section {
            None => true,
            Some(section) => bank
                .get(&a.question_id)
                .and_then(|q| q.section.as_deref())
                .is_some_and(|s| s.eq_ignore_ascii_case(section)),
        })
        .cloned()
        .collect()
}
