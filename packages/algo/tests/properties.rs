//! Property-Based Tests for the study decision logic
//!
//! Tests the following invariants:
//! - Accuracy: correct / attempted, undefined when nothing was attempted
//! - Quiz uniqueness: no question id appears twice in one quiz
//! - Difficulty mix: 30/50/20 within rounding when every tier is stocked
//! - Recency: exclusions relax only when needed, least recent first
//! - Streaks and milestones: consistent and idempotent over any history
//! - Error patterns: any recorded time spent is classified without overflow

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use prepcoach_algo::quiz::{recent_question_ids, tier_targets, DIFFICULTY_MIX_PERCENT};
use prepcoach_algo::{
    aggregate, error_patterns, evaluate_milestones, generate_quiz, quiz_rng, streak_report, utc_offset,
    AggregatorConfig, AttemptRecord, Difficulty, Question, QuestionBank, QuizConfig, QuizRequest,
    RecencyWindow, GENERAL_SUBTOPIC,
};

const TOPICS: [&str; 4] = ["algebra", "geometry", "reading", "grammar"];

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

fn make_bank(per_tier: [usize; 3]) -> QuestionBank {
    let mut questions = Vec::new();
    for difficulty in Difficulty::ALL {
        for i in 0..per_tier[difficulty.index()] {
            questions.push(Question {
                question_id: format!("{}-{i}", difficulty.as_str()),
                test_type: None,
                section: None,
                topic: TOPICS[i % TOPICS.len()].to_string(),
                subtopic: GENERAL_SUBTOPIC.to_string(),
                difficulty,
                content: String::new(),
                options: vec![],
                correct_answer: "A".to_string(),
                explanation: String::new(),
                average_time_secs: 90,
            });
        }
    }
    QuestionBank::new(questions).unwrap()
}

fn arb_bank() -> impl Strategy<Value = QuestionBank> {
    (0usize..30, 0usize..30, 0usize..30).prop_map(|(e, m, h)| make_bank([e, m, h]))
}

/// Attempts against `bank`, oldest first, one to a few hours apart.
fn arb_history(bank: QuestionBank, max_len: usize) -> impl Strategy<Value = (QuestionBank, Vec<AttemptRecord>)> {
    let ids: Vec<String> = bank.questions().iter().map(|q| q.question_id.clone()).collect();
    let len = if ids.is_empty() { 0..1 } else { 0..max_len };
    let picks = prop::collection::vec((any::<prop::sample::Index>(), any::<bool>(), 1i64..72), len);
    picks.prop_map(move |picks| {
        let mut ts = start();
        let history = picks
            .into_iter()
            .enumerate()
            .map(|(i, (index, is_correct, gap_hours))| {
                ts += Duration::hours(gap_hours);
                AttemptRecord {
                    user_id: "u1".to_string(),
                    question_id: index.get(&ids).clone(),
                    is_correct,
                    timestamp: ts,
                    quiz_id: Some(format!("quiz-{}", i / 5)),
                    answer: None,
                    time_spent_secs: None,
                }
            })
            .collect();
        (bank.clone(), history)
    })
}

fn arb_bank_and_history() -> impl Strategy<Value = (QuestionBank, Vec<AttemptRecord>)> {
    arb_bank().prop_flat_map(|bank| arb_history(bank, 60))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_accuracy_is_correct_over_attempted((bank, history) in arb_bank_and_history()) {
        let report = aggregate(&history, &bank, &AggregatorConfig::default());
        let correct = history.iter().filter(|a| a.is_correct).count() as u32;

        prop_assert_eq!(report.total_attempted as usize, history.len());
        prop_assert_eq!(report.total_correct, correct);
        if history.is_empty() {
            prop_assert!(report.overall_accuracy.is_none());
            prop_assert!(report.recent_accuracy.is_none());
            prop_assert!(report.trend.is_none());
        } else {
            let expected = correct as f64 / history.len() as f64;
            prop_assert_eq!(report.overall_accuracy, Some(expected));
        }
        for topic in &report.topics {
            prop_assert!(topic.attempted > 0);
            prop_assert_eq!(topic.accuracy, Some(topic.correct as f64 / topic.attempted as f64));
        }
        let topic_total: u32 = report.topics.iter().map(|t| t.attempted).sum();
        prop_assert_eq!(topic_total, report.total_attempted);
    }

    #[test]
    fn prop_quiz_has_no_duplicates(
        (bank, history) in arb_bank_and_history(),
        count in 1usize..=50,
        seed in any::<u64>(),
    ) {
        let mut rng = quiz_rng(Some(seed));
        let quiz = generate_quiz(&bank, &history, &QuizRequest::new(count), &QuizConfig::default(), &mut rng).unwrap();

        let unique: HashSet<&String> = quiz.question_ids.iter().collect();
        prop_assert_eq!(unique.len(), quiz.question_ids.len());
        prop_assert_eq!(quiz.question_ids.len(), count.min(bank.len()));
        prop_assert_eq!(quiz.partial, bank.len() < count);
        for id in &quiz.question_ids {
            prop_assert!(bank.get(id).is_some());
        }
    }

    #[test]
    fn prop_difficulty_mix_when_stocked(count in 1usize..=50, seed in any::<u64>()) {
        let bank = make_bank([count, count, count]);
        let mut rng = quiz_rng(Some(seed));
        let quiz = generate_quiz(&bank, &[], &QuizRequest::new(count), &QuizConfig::default(), &mut rng).unwrap();

        let mut per_tier = [0usize; 3];
        for id in &quiz.question_ids {
            per_tier[bank.get(id).unwrap().difficulty.index()] += 1;
        }
        prop_assert_eq!(per_tier, tier_targets(count));
        for tier in 0..3 {
            let exact = (count * DIFFICULTY_MIX_PERCENT[tier]) as f64 / 100.0;
            prop_assert!((per_tier[tier] as f64 - exact).abs() < 1.0);
        }
    }

    #[test]
    fn prop_recency_relaxes_only_when_needed(
        (bank, history) in arb_bank_and_history(),
        window in 0usize..40,
        count in 1usize..=50,
        seed in any::<u64>(),
    ) {
        let config = QuizConfig { recency: RecencyWindow::Attempts(window), ..QuizConfig::default() };
        let mut rng = quiz_rng(Some(seed));
        let quiz = generate_quiz(&bank, &history, &QuizRequest::new(count), &config, &mut rng).unwrap();

        let recent = recent_question_ids(&history, RecencyWindow::Attempts(window));
        let fresh = bank.len() - recent.len();
        let expected_relaxed = count.saturating_sub(fresh).min(recent.len());
        prop_assert_eq!(quiz.relaxed_exclusions, expected_relaxed);

        // Only the least recently answered may come back.
        let readmitted: HashSet<&String> = recent[recent.len() - expected_relaxed..].iter().collect();
        let recent_set: HashSet<&String> = recent.iter().collect();
        for id in &quiz.question_ids {
            if recent_set.contains(id) {
                prop_assert!(readmitted.contains(id));
            }
        }
    }

    #[test]
    fn prop_streak_consistent((_bank, history) in arb_bank_and_history(), offset_hours in -12i32..=14) {
        let offset = utc_offset(offset_hours * 60);
        let today = history.last().map_or(start(), |a| a.timestamp).with_timezone(&offset).date_naive();
        let report = streak_report(&history, offset, today);

        match (report.current, report.longest) {
            (Some(current), Some(longest)) => {
                prop_assert!(current.length <= longest.length);
                prop_assert!(longest.length <= report.study_days);
                prop_assert!(report.active);
                prop_assert_eq!(
                    (current.end - current.start).num_days() + 1,
                    current.length as i64
                );
            }
            (None, None) => prop_assert!(history.is_empty()),
            _ => prop_assert!(false, "current and longest must both exist or neither"),
        }
    }

    #[test]
    fn prop_milestones_idempotent((_bank, history) in arb_bank_and_history(), split in 0usize..60) {
        let offset = utc_offset(0);
        let point = split.min(history.len());

        let first = evaluate_milestones(&history, offset, point);
        let again = evaluate_milestones(&history, offset, point);
        prop_assert_eq!(&first, &again);

        // Once everything is seen nothing is new.
        let settled = evaluate_milestones(&history, offset, history.len());
        prop_assert!(settled.new.is_empty());
        prop_assert_eq!(settled.achieved, first.achieved.clone());

        // Milestones seen before the split stay achieved with the prefix alone.
        let prefix = evaluate_milestones(&history[..point], offset, point);
        for old in first.achieved.iter().filter(|m| m.attempt_index < point) {
            prop_assert!(prefix.achieved.iter().any(|m| m.key == old.key));
        }
    }

    #[test]
    fn prop_error_patterns_any_time_spent(
        (bank, history) in arb_bank_and_history(),
        times in prop::collection::vec(any::<u32>(), 60),
    ) {
        let history: Vec<AttemptRecord> = history
            .into_iter()
            .zip(times)
            .map(|(mut attempt, spent)| {
                attempt.time_spent_secs = Some(spent);
                attempt
            })
            .collect();

        let patterns = error_patterns(&history, &bank, None);
        let wrong = history.iter().filter(|a| !a.is_correct).count() as u32;
        prop_assert_eq!(patterns.total_errors, wrong);

        let rushed = history
            .iter()
            .filter(|a| !a.is_correct)
            .filter(|a| {
                let avg = bank.get(&a.question_id).map_or(0, |q| q.average_time_secs);
                a.time_spent_secs.map_or(false, |t| u64::from(t) * 2 < u64::from(avg))
            })
            .count();
        match patterns.time_pressure {
            Some(pressure) => prop_assert_eq!(pressure.count, rushed),
            None => prop_assert!(rushed <= prepcoach_algo::patterns::TIME_PRESSURE_MIN_COUNT),
        }
    }
}
