use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use prepcoach_algo::{AttemptRecord, QuestionBank};
use uuid::Uuid;

use crate::store::{PracticeTestResult, SectionScore, StoreError, StudyStore, UserProfile};

pub const DEMO_USER_ID: &str = "mock-user";
pub const DEMO_QUIZ_ID: &str = "sample-quiz-1";
const DEMO_ATTEMPTS: usize = 10;

/// Seeds one demo learner with a practice test and a short answer history.
/// Existing data for the demo user is left untouched.
pub async fn seed_demo_data(
    store: &dyn StudyStore,
    bank: &QuestionBank,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    if store.get_profile(DEMO_USER_ID).await.is_ok() {
        tracing::debug!(user_id = DEMO_USER_ID, "demo user already exists");
        return Ok(());
    }

    store.put_profile(demo_profile(now)).await?;
    store.append_test_result(DEMO_USER_ID, demo_test_result(now)).await?;

    let attempts = demo_attempts(bank, now);
    let seeded = attempts.len();
    store.append_attempts(DEMO_USER_ID, attempts).await?;

    tracing::info!(user_id = DEMO_USER_ID, attempts = seeded, "seeded demo user");
    Ok(())
}

fn demo_profile(now: DateTime<Utc>) -> UserProfile {
    let mut profile = UserProfile::new(DEMO_USER_ID);
    profile.name = Some("Suzy".to_string());
    profile.email = Some("student@example.com".to_string());
    profile.test_type = Some("ABC Certification".to_string());
    profile.target_score = Some(1600);
    profile.baseline_score = Some(1200);
    profile.current_level = Some("intermediate".to_string());
    profile.study_hours_per_week = Some(10);
    profile.test_date = Some((now + Duration::days(90)).date_naive());
    profile
        .preferences
        .insert("preferred_study_time".to_string(), serde_json::json!("evening"));
    profile
}

fn demo_test_result(now: DateTime<Utc>) -> PracticeTestResult {
    let sections: BTreeMap<String, SectionScore> = [
        ("reading", 240, 85),
        ("writing", 220, 74),
        ("reasoning", 140, 75),
        ("algebra", 100, 25),
        ("geometry", 100, 25),
    ]
    .into_iter()
    .map(|(name, score, percentile)| {
        (
            name.to_string(),
            SectionScore {
                score,
                percentile: Some(percentile),
            },
        )
    })
    .collect();

    PracticeTestResult {
        test_id: Uuid::new_v4().to_string(),
        test_type: "SAT".to_string(),
        total_score: 800,
        sections,
        date_taken: now - Duration::days(14),
    }
}

/// One attempt per day over the first questions of the bank, oldest first,
/// ending today; every third answer is wrong.
fn demo_attempts(bank: &QuestionBank, now: DateTime<Utc>) -> Vec<AttemptRecord> {
    let questions: Vec<_> = bank.questions().iter().take(DEMO_ATTEMPTS).collect();
    questions
        .iter()
        .enumerate()
        .rev()
        .map(|(i, question)| {
            let is_correct = i % 3 != 0;
            let answer = if is_correct {
                question.correct_answer.clone()
            } else {
                wrong_answer(&question.correct_answer)
            };
            AttemptRecord {
                user_id: DEMO_USER_ID.to_string(),
                question_id: question.question_id.clone(),
                is_correct,
                timestamp: now - Duration::days(i as i64),
                quiz_id: Some(DEMO_QUIZ_ID.to_string()),
                answer: Some(answer),
                time_spent_secs: Some(question.average_time_secs + (i as u32) * 10),
            }
        })
        .collect()
}

fn wrong_answer(correct: &str) -> String {
    ["A", "B", "C", "D"]
        .into_iter()
        .find(|letter| !letter.eq_ignore_ascii_case(correct.trim()))
        .unwrap_or("A")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question_bank::builtin_bank;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_seed_is_chronological_and_idempotent() {
        let store = InMemoryStore::new();
        let bank = builtin_bank().unwrap();
        let now = Utc::now();

        seed_demo_data(&store, &bank, now).await.unwrap();
        seed_demo_data(&store, &bank, now).await.unwrap();

        let snapshot = store.snapshot(DEMO_USER_ID).await.unwrap();
        assert_eq!(snapshot.attempts.len(), DEMO_ATTEMPTS);
        assert_eq!(snapshot.test_results.len(), 1);
        assert!(snapshot
            .attempts
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));

        let correct = snapshot.attempts.iter().filter(|a| a.is_correct).count();
        assert_eq!(correct, 6);
    }

    #[test]
    fn test_wrong_answer_differs() {
        assert_eq!(wrong_answer("A"), "B");
        assert_eq!(wrong_answer("c"), "A");
    }
}
