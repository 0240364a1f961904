use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use prepcoach_algo::{
    aggregate, as_percent, error_patterns, filter_attempts, ErrorPatterns, PerformanceReport,
    Timeframe, TopicPerformance, Trend,
};
use serde::{Deserialize, Serialize};

use super::ServiceError;
use crate::state::AppState;
use crate::store::{PracticeTestResult, UserSnapshot};

// ==================== Topic Analysis ====================

/// Display form of a performance report. Accuracies are percentages with two
/// decimals, `null` when nothing was attempted.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceView {
    pub total_attempted: u32,
    pub total_correct: u32,
    pub overall_accuracy: Option<f64>,
    pub recent_attempted: u32,
    pub recent_accuracy: Option<f64>,
    pub trend: Option<Trend>,
    pub topics: Vec<TopicView>,
    pub unclassified_attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
    pub topic: String,
    pub attempted: u32,
    pub correct: u32,
    pub accuracy: Option<f64>,
    pub subtopics: Vec<SubtopicView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtopicView {
    pub subtopic: String,
    pub attempted: u32,
    pub correct: u32,
    pub accuracy: Option<f64>,
}

impl From<&TopicPerformance> for TopicView {
    fn from(topic: &TopicPerformance) -> Self {
        Self {
            topic: topic.topic.clone(),
            attempted: topic.attempted,
            correct: topic.correct,
            accuracy: as_percent(topic.accuracy),
            subtopics: topic
                .subtopics
                .iter()
                .map(|s| SubtopicView {
                    subtopic: s.subtopic.clone(),
                    attempted: s.attempted,
                    correct: s.correct,
                    accuracy: as_percent(s.accuracy),
                })
                .collect(),
        }
    }
}

impl From<&PerformanceReport> for PerformanceView {
    fn from(report: &PerformanceReport) -> Self {
        Self {
            total_attempted: report.total_attempted,
            total_correct: report.total_correct,
            overall_accuracy: as_percent(report.overall_accuracy),
            recent_attempted: report.recent_attempted,
            recent_accuracy: as_percent(report.recent_accuracy),
            trend: report.trend,
            topics: report.topics.iter().map(TopicView::from).collect(),
            unclassified_attempts: report.unclassified_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicAnalysis {
    pub section: Option<String>,
    pub timeframe: Timeframe,
    #[serde(flatten)]
    pub performance: PerformanceView,
}

pub async fn analyze_by_topic(
    state: &AppState,
    user_id: &str,
    timeframe: Timeframe,
    section: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TopicAnalysis, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    let attempts = filter_attempts(&snapshot.attempts, state.bank(), timeframe, section, now);
    let report = aggregate(&attempts, state.bank(), &state.settings().aggregator);

    Ok(TopicAnalysis {
        section: section.map(str::to_string),
        timeframe,
        performance: PerformanceView::from(&report),
    })
}

// ==================== Error Patterns ====================

const TIME_PRESSURE_ADVICE: &str =
    "You're answering quickly but getting them wrong. Consider slowing down.";

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPatternsView {
    #[serde(flatten)]
    pub patterns: ErrorPatterns,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

pub async fn identify_error_patterns(
    state: &AppState,
    user_id: &str,
    question_ids: Option<&[String]>,
) -> Result<ErrorPatternsView, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    let patterns = error_patterns(&snapshot.attempts, state.bank(), question_ids);

    let message = if patterns.total_errors == 0 {
        Some("No errors found - excellent work!")
    } else if patterns.time_pressure.is_some() {
        Some(TIME_PRESSURE_ADVICE)
    } else {
        None
    };
    Ok(ErrorPatternsView { patterns, message })
}

// ==================== Practice Tests ====================

fn find_test<'a>(
    snapshot: &'a UserSnapshot,
    test_id: Option<&str>,
) -> Result<&'a PracticeTestResult, ServiceError> {
    let user_id = &snapshot.profile.user_id;
    match test_id {
        Some(id) => snapshot
            .test_results
            .iter()
            .find(|t| t.test_id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("test {id} not found for user {user_id}"))),
        None => snapshot
            .test_results
            .last()
            .ok_or_else(|| ServiceError::NotFound(format!("no practice test results for user {user_id}"))),
    }
}

pub async fn latest_test_results(
    state: &AppState,
    user_id: &str,
    test_id: Option<&str>,
) -> Result<PracticeTestResult, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    find_test(&snapshot, test_id).cloned()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonType {
    #[default]
    Historical,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionChange {
    pub current: u32,
    pub previous: u32,
    pub change: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressComparison {
    /// No practice test taken yet
    NoTests {
        baseline_score: Option<u32>,
        target_score: Option<u32>,
    },
    /// A single test, compared against the recorded baseline
    AgainstBaseline {
        current_score: u32,
        baseline_score: Option<u32>,
        score_change: Option<i64>,
    },
    Historical {
        current_score: u32,
        previous_score: u32,
        score_change: i64,
        improvement: bool,
        section_changes: BTreeMap<String, SectionChange>,
        tests_taken: usize,
    },
    Target {
        current_score: u32,
        target_score: u32,
        score_gap: i64,
        on_track: bool,
    },
    NoTarget {
        current_score: u32,
    },
}

pub fn compare(snapshot: &UserSnapshot, comparison: ComparisonType) -> ProgressComparison {
    let profile = &snapshot.profile;
    let tests = &snapshot.test_results;
    let Some(latest) = tests.last() else {
        return ProgressComparison::NoTests {
            baseline_score: profile.baseline_score,
            target_score: profile.target_score,
        };
    };
    let current = latest.total_score;

    match comparison {
        ComparisonType::Historical if tests.len() < 2 => ProgressComparison::AgainstBaseline {
            current_score: current,
            baseline_score: profile.baseline_score,
            score_change: profile
                .baseline_score
                .map(|baseline| i64::from(current) - i64::from(baseline)),
        },
        ComparisonType::Historical => {
            let previous = &tests[tests.len() - 2];
            let section_changes = latest
                .sections
                .iter()
                .filter_map(|(name, now)| {
                    let before = previous.sections.get(name)?;
                    Some((
                        name.clone(),
                        SectionChange {
                            current: now.score,
                            previous: before.score,
                            change: i64::from(now.score) - i64::from(before.score),
                        },
                    ))
                })
                .collect();
            let score_change = i64::from(current) - i64::from(previous.total_score);
            ProgressComparison::Historical {
                current_score: current,
                previous_score: previous.total_score,
                score_change,
                improvement: score_change > 0,
                section_changes,
                tests_taken: tests.len(),
            }
        }
        ComparisonType::Target => match profile.target_score {
            Some(target) => {
                let score_gap = i64::from(target) - i64::from(current);
                ProgressComparison::Target {
                    current_score: current,
                    target_score: target,
                    score_gap,
                    on_track: score_gap <= 0,
                }
            }
            None => ProgressComparison::NoTarget {
                current_score: current,
            },
        },
    }
}

pub async fn compare_progress(
    state: &AppState,
    user_id: &str,
    comparison: ComparisonType,
) -> Result<ProgressComparison, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    Ok(compare(&snapshot, comparison))
}

// ==================== Bar Chart ====================

const DEFAULT_BAR_COLOR: &str = "#8E8E93";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: u32,
    /// Share of the test total, rounded
    pub percentage: u32,
    pub color: &'static str,
    pub section_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub test_id: String,
    pub test_type: String,
    pub total_score: u32,
    pub date_taken: DateTime<Utc>,
    /// Highest first
    pub bars: Vec<Bar>,
    pub max_value: u32,
    pub y_axis_label: &'static str,
    pub x_axis_label: &'static str,
}

fn section_color(section: &str) -> &'static str {
    match section {
        "reading" => "#1C1C1E",
        "writing" => "#3A3A3C",
        "math" => "#6D6D70",
        "verbal" => "#8E8E93",
        "quantitative" | "algebra" => "#AEAEB2",
        "reasoning" => "#5A5A5D",
        "geometry" => "#C7C7CC",
        _ => DEFAULT_BAR_COLOR,
    }
}

pub(crate) fn section_label(section: &str) -> String {
    section
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn bar_chart(test: &PracticeTestResult) -> Result<BarChart, ServiceError> {
    if test.sections.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "test {} has no section scores",
            test.test_id
        )));
    }

    let mut bars: Vec<Bar> = test
        .sections
        .iter()
        .map(|(key, section)| Bar {
            label: section_label(key),
            value: section.score,
            percentage: if test.total_score > 0 {
                (f64::from(section.score) * 100.0 / f64::from(test.total_score)).round() as u32
            } else {
                0
            },
            color: section_color(key),
            section_key: key.clone(),
        })
        .collect();
    bars.sort_by(|a, b| b.value.cmp(&a.value));

    Ok(BarChart {
        test_id: test.test_id.clone(),
        test_type: test.test_type.clone(),
        total_score: test.total_score,
        date_taken: test.date_taken,
        max_value: bars.first().map_or(0, |b| b.value),
        bars,
        y_axis_label: "Score",
        x_axis_label: "Subject",
    })
}

pub async fn bar_chart_data(
    state: &AppState,
    user_id: &str,
    test_id: Option<&str>,
) -> Result<BarChart, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    bar_chart(find_test(&snapshot, test_id)?)
}
