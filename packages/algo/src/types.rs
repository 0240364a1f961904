//! Common Types and Constants
//!
//! Shared data structures used across all decision modules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==================== Constants ====================

/// Default solve time for a question without calibration data (seconds)
pub const DEFAULT_AVERAGE_TIME_SECS: u32 = 90;

/// Subtopic used when a question does not declare one
pub const GENERAL_SUBTOPIC: &str = "general";

// ==================== Question Types ====================

/// Difficulty tier of a question
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// All tiers, easiest first
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn index(self) -> usize {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// A question from the bank. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub topic: String,
    #[serde(default = "default_subtopic")]
    pub subtopic: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    /// Typical solve time in seconds
    #[serde(default = "default_average_time")]
    pub average_time_secs: u32,
}

fn default_subtopic() -> String {
    GENERAL_SUBTOPIC.to_string()
}

fn default_average_time() -> u32 {
    DEFAULT_AVERAGE_TIME_SECS
}

impl Question {
    /// Answers are compared trimmed and case-insensitively ("b" matches "B").
    pub fn is_correct_answer(&self, answer: &str) -> bool {
        self.correct_answer.trim().eq_ignore_ascii_case(answer.trim())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BankError {
    #[error("duplicate question id: {0}")]
    DuplicateId(String),
    #[error("question {0} has an empty topic")]
    EmptyTopic(String),
}

/// Indexed, immutable question bank. Also serves as the topic taxonomy.
#[derive(Clone, Debug, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
    index: HashMap<String, usize>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        let mut index = HashMap::with_capacity(questions.len());
        for (pos, question) in questions.iter().enumerate() {
            if question.topic.trim().is_empty() {
                return Err(BankError::EmptyTopic(question.question_id.clone()));
            }
            if index.insert(question.question_id.clone(), pos).is_some() {
                return Err(BankError::DuplicateId(question.question_id.clone()));
            }
        }
        Ok(Self { questions, index })
    }

    pub fn get(&self, question_id: &str) -> Option<&Question> {
        self.index.get(question_id).map(|&pos| &self.questions[pos])
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Distinct topics in bank order
    pub fn topics(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for question in &self.questions {
            if !seen.contains(&question.topic.as_str()) {
                seen.push(question.topic.as_str());
            }
        }
        seen
    }
}

// ==================== Attempt Types ====================

/// One recorded answer to one question by one user. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub user_id: String,
    pub question_id: String,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_secs: Option<u32>,
}

/// Raw attempted/correct counters for one scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub attempted: u32,
    pub correct: u32,
}

impl Tally {
    pub fn record(&mut self, is_correct: bool) {
        self.attempted += 1;
        if is_correct {
            self.correct += 1;
        }
    }

    pub fn from_attempts<'a, I>(attempts: I) -> Self
    where
        I: IntoIterator<Item = &'a AttemptRecord>,
    {
        let mut tally = Tally::default();
        for attempt in attempts {
            tally.record(attempt.is_correct);
        }
        tally
    }

    /// `None` when nothing was attempted.
    pub fn accuracy(&self) -> Option<f64> {
        accuracy(self.correct, self.attempted)
    }
}

/// correct / attempted, undefined (`None`) when attempted is zero.
pub fn accuracy(correct: u32, attempted: u32) -> Option<f64> {
    if attempted == 0 {
        None
    } else {
        Some(correct as f64 / attempted as f64)
    }
}

/// Ratio as a percentage rounded to two decimals, for display payloads.
pub fn as_percent(ratio: Option<f64>) -> Option<f64> {
    ratio.map(|r| (r * 10_000.0).round() / 100.0)
}
