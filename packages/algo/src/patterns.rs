//! Error pattern analysis over a learner's incorrect answers.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::types::{AttemptRecord, Difficulty, QuestionBank};

pub const TOP_ERROR_TOPICS: usize = 5;
/// Rushed wrong answers needed before time pressure is reported
pub const TIME_PRESSURE_MIN_COUNT: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopicErrors {
    pub topic: String,
    pub errors: u32,
}

/// A wrong answer given in under half the question's typical time
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RushedAnswer {
    pub question_id: String,
    pub topic: String,
    pub time_spent_secs: u32,
    pub average_time_secs: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimePressure {
    pub count: usize,
    pub answers: Vec<RushedAnswer>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ErrorPatterns {
    pub total_errors: u32,
    /// Most errors first, at most [`TOP_ERROR_TOPICS`]
    pub topic_errors: Vec<TopicErrors>,
    pub difficulty_errors: BTreeMap<Difficulty, u32>,
    /// Present only when more than [`TIME_PRESSURE_MIN_COUNT`] answers were rushed
    pub time_pressure: Option<TimePressure>,
}

/// Analyzes incorrect attempts, optionally limited to `question_ids`.
///
/// Errors on questions missing from the bank count toward the total only.
pub fn error_patterns(
    attempts: &[AttemptRecord],
    bank: &QuestionBank,
    question_ids: Option<&[String]>,
) -> ErrorPatterns {
    let mut patterns = ErrorPatterns::default();
    let mut by_topic: HashMap<&str, u32> = HashMap::new();
    let mut rushed = Vec::new();

    let errors = attempts.iter().filter(|a| !a.is_correct).filter(|a| {
        question_ids.map_or(true, |ids| ids.iter().any(|id| *id == a.question_id))
    });

    for attempt in errors {
        patterns.total_errors += 1;
        let Some(question) = bank.get(&attempt.question_id) else {
            continue;
        };
        *by_topic.entry(question.topic.as_str()).or_default() += 1;
        *patterns
            .difficulty_errors
            .entry(question.difficulty)
            .or_default() += 1;

        if let Some(spent) = attempt.time_spent_secs {
            if u64::from(spent) * 2 < u64::from(question.average_time_secs) {
                rushed.push(RushedAnswer {
                    question_id: question.question_id.clone(),
                    topic: question.topic.clone(),
                    time_spent_secs: spent,
                    average_time_secs: question.average_time_secs,
                });
            }
        }
    }

    let mut topics: Vec<TopicErrors> = by_topic
        .into_iter()
        .map(|(topic, errors)| TopicErrors {
            topic: topic.to_string(),
            errors,
        })
        .collect();
    topics.sort_by(|a, b| b.errors.cmp(&a.errors).then_with(|| a.topic.cmp(&b.topic)));
    topics.truncate(TOP_ERROR_TOPICS);
    patterns.topic_errors = topics;

    if rushed.len() > TIME_PRESSURE_MIN_COUNT {
        patterns.time_pressure = Some(TimePressure {
            count: rushed.len(),
            answers: rushed,
        });
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Question, GENERAL_SUBTOPIC};
    use chrono::Utc;

    fn question(id: &str, topic: &str, difficulty: Difficulty) -> Question {
        Question {
            question_id: id.to_string(),
            test_type: None,
            section: None,
            topic: topic.to_string(),
            subtopic: GENERAL_SUBTOPIC.to_string(),
            difficulty,
            content: String::new(),
            options: vec![],
            correct_answer: "A".to_string(),
            explanation: String::new(),
            average_time_secs: 100,
        }
    }

    fn wrong(question_id: &str, time_spent: Option<u32>) -> AttemptRecord {
        AttemptRecord {
            user_id: "u1".to_string(),
            question_id: question_id.to_string(),
            is_correct: false,
            timestamp: Utc::now(),
            quiz_id: None,
            answer: Some("B".to_string()),
            time_spent_secs: time_spent,
        }
    }

    fn bank() -> QuestionBank {
        QuestionBank::new(vec![
            question("q1", "algebra", Difficulty::Easy),
            question("q2", "algebra", Difficulty::Hard),
            question("q3", "geometry", Difficulty::Medium),
            question("q4", "reading", Difficulty::Medium),
        ])
        .unwrap()
    }

    #[test]
    fn test_no_errors() {
        let patterns = error_patterns(&[], &bank(), None);
        assert_eq!(patterns.total_errors, 0);
        assert!(patterns.topic_errors.is_empty());
        assert!(patterns.time_pressure.is_none());
    }

    #[test]
    fn test_topic_and_difficulty_counts() {
        let mut attempts = vec![
            wrong("q1", None),
            wrong("q2", None),
            wrong("q3", None),
            wrong("missing", None),
        ];
        attempts[2].is_correct = true;

        let patterns = error_patterns(&attempts, &bank(), None);
        assert_eq!(patterns.total_errors, 3);
        assert_eq!(
            patterns.topic_errors,
            vec![TopicErrors {
                topic: "algebra".to_string(),
                errors: 2
            }]
        );
        assert_eq!(patterns.difficulty_errors.get(&Difficulty::Easy), Some(&1));
        assert_eq!(patterns.difficulty_errors.get(&Difficulty::Medium), None);
    }

    #[test]
    fn test_question_filter() {
        let attempts = vec![wrong("q1", None), wrong("q3", None)];
        let ids = vec!["q3".to_string()];
        let patterns = error_patterns(&attempts, &bank(), Some(&ids));
        assert_eq!(patterns.total_errors, 1);
        assert_eq!(patterns.topic_errors[0].topic, "geometry");
    }

    #[test]
    fn test_time_pressure_needs_more_than_three() {
        let three: Vec<_> = ["q1", "q2", "q3"].iter().map(|id| wrong(id, Some(20))).collect();
        assert!(error_patterns(&three, &bank(), None).time_pressure.is_none());

        let mut four = three.clone();
        four.push(wrong("q4", Some(49)));
        // exactly half is not rushed
        four.push(wrong("q4", Some(50)));
        let pressure = error_patterns(&four, &bank(), None).time_pressure.unwrap();
        assert_eq!(pressure.count, 4);
    }

    #[test]
    fn test_huge_time_spent_is_not_rushed() {
        let attempts: Vec<_> = ["q1", "q2", "q3", "q4"]
            .iter()
            .map(|id| wrong(id, Some(u32::MAX)))
            .collect();
        let patterns = error_patterns(&attempts, &bank(), None);
        assert_eq!(patterns.total_errors, 4);
        assert!(patterns.time_pressure.is_none());
    }
}
