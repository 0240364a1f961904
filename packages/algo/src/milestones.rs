//! Milestone detection
//!
//! Milestones are derived from the attempt history alone, so evaluating the
//! same history twice yields the same set. A milestone is "new" relative to an
//! evaluation point when it was first crossed at or after that attempt index.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::streak::local_date;
use crate::types::AttemptRecord;

// ==================== Thresholds ====================

/// Cumulative answered-question counts worth celebrating
pub const VOLUME_THRESHOLDS: [(u32, &str); 6] = [
    (10, "First Ten"),
    (50, "Fifty Strong"),
    (100, "Century Club"),
    (250, "Quarter Thousand"),
    (500, "Five Hundred Club"),
    (1000, "Thousand Question Master"),
];

/// Consecutive-study-day lengths
pub const STREAK_THRESHOLDS: [(u32, &str); 4] = [
    (3, "Three Day Streak"),
    (7, "Week Warrior"),
    (14, "Fortnight Focus"),
    (30, "Monthly Master"),
];

/// Smallest quiz considered for personal-best accuracy
pub const MIN_QUIZ_SIZE_FOR_BEST: u32 = 5;

// ==================== Types ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    PracticeVolume,
    Streak,
    PersonalBest,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Milestone {
    /// Stable identifier, e.g. `volume:100`, `streak:7`, `best:<quiz_id>`
    pub key: String,
    pub kind: MilestoneKind,
    pub title: String,
    pub description: String,
    /// Index into the history of the attempt that crossed it
    pub attempt_index: usize,
    pub achieved_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MilestoneReport {
    pub achieved: Vec<Milestone>,
    pub new: Vec<Milestone>,
}

// ==================== Evaluation ====================

/// Evaluates milestones over `history` (chronological).
///
/// `evaluation_point` is the index of the first attempt not yet seen by the
/// learner; pass `history.len()` to get no new milestones, or the history
/// length before a quiz submission to get what that submission unlocked.
pub fn evaluate_milestones(
    history: &[AttemptRecord],
    offset: FixedOffset,
    evaluation_point: usize,
) -> MilestoneReport {
    let mut achieved = Vec::new();
    achieved.extend(volume_milestones(history));
    achieved.extend(streak_milestones(history, offset));
    achieved.extend(personal_best_milestones(history));
    achieved.sort_by(|a, b| a.attempt_index.cmp(&b.attempt_index));

    let new = achieved
        .iter()
        .filter(|m| m.attempt_index >= evaluation_point)
        .cloned()
        .collect();

    MilestoneReport { achieved, new }
}

fn volume_milestones(history: &[AttemptRecord]) -> Vec<Milestone> {
    VOLUME_THRESHOLDS
        .iter()
        .filter(|(threshold, _)| history.len() >= *threshold as usize)
        .map(|&(threshold, title)| {
            let index = threshold as usize - 1;
            Milestone {
                key: format!("volume:{threshold}"),
                kind: MilestoneKind::PracticeVolume,
                title: title.to_string(),
                description: format!("Answered {threshold} practice questions"),
                attempt_index: index,
                achieved_at: history[index].timestamp,
            }
        })
        .collect()
}

/// Walks the history tracking the running day streak; each threshold fires
/// once, on the attempt whose local day first extends the run to it.
fn streak_milestones(history: &[AttemptRecord], offset: FixedOffset) -> Vec<Milestone> {
    let mut milestones = Vec::new();
    let mut last_day: Option<NaiveDate> = None;
    let mut run = 0u32;
    let mut next = 0usize;

    for (index, attempt) in history.iter().enumerate() {
        let day = local_date(attempt.timestamp, offset);
        match last_day {
            Some(prev) if day <= prev => continue,
            Some(prev) if prev + Duration::days(1) == day => run += 1,
            _ => run = 1,
        }
        last_day = Some(day);

        while next < STREAK_THRESHOLDS.len() && run >= STREAK_THRESHOLDS[next].0 {
            let (threshold, title) = STREAK_THRESHOLDS[next];
            milestones.push(Milestone {
                key: format!("streak:{threshold}"),
                kind: MilestoneKind::Streak,
                title: title.to_string(),
                description: format!("Studied {threshold} days in a row"),
                attempt_index: index,
                achieved_at: attempt.timestamp,
            });
            next += 1;
        }
    }
    milestones
}

struct QuizTally {
    attempted: u32,
    correct: u32,
    last_index: usize,
}

/// A quiz of at least [`MIN_QUIZ_SIZE_FOR_BEST`] questions whose accuracy
/// strictly beats every earlier qualifying quiz. The first qualifying quiz
/// only sets the bar.
fn personal_best_milestones(history: &[AttemptRecord]) -> Vec<Milestone> {
    let mut quizzes: HashMap<&str, QuizTally> = HashMap::new();
    for (index, attempt) in history.iter().enumerate() {
        let Some(quiz_id) = attempt.quiz_id.as_deref() else {
            continue;
        };
        let tally = quizzes.entry(quiz_id).or_insert(QuizTally {
            attempted: 0,
            correct: 0,
            last_index: index,
        });
        tally.attempted += 1;
        if attempt.is_correct {
            tally.correct += 1;
        }
        tally.last_index = index;
    }

    let mut completed: Vec<(&str, QuizTally)> = quizzes
        .into_iter()
        .filter(|(_, t)| t.attempted >= MIN_QUIZ_SIZE_FOR_BEST)
        .collect();
    completed.sort_by_key(|(_, t)| t.last_index);

    let mut milestones = Vec::new();
    let mut best: Option<(u32, u32)> = None;
    for (quiz_id, tally) in completed {
        let beats = match best {
            None => false,
            // correct/attempted > best_correct/best_attempted, without floats
            Some((bc, ba)) => u64::from(tally.correct) * u64::from(ba) > u64::from(bc) * u64::from(tally.attempted),
        };
        if beats {
            let percent = (f64::from(tally.correct) * 100.0 / f64::from(tally.attempted)).round();
            milestones.push(Milestone {
                key: format!("best:{quiz_id}"),
                kind: MilestoneKind::PersonalBest,
                title: "New Personal Best".to_string(),
                description: format!("Scored {percent}% on a quiz, your best yet"),
                attempt_index: tally.last_index,
                achieved_at: history[tally.last_index].timestamp,
            });
        }
        if best.is_none() || beats {
            best = Some((tally.correct, tally.attempted));
        }
    }
    milestones
}
