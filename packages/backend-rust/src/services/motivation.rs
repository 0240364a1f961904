use prepcoach_algo::{as_percent, Tally};
use serde::{Deserialize, Serialize};

use super::ServiceError;
use crate::state::AppState;
use crate::store::UserSnapshot;

const RECENT_ATTEMPTS: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncouragementContext {
    AfterQuiz,
    Struggling,
    Milestone,
    #[default]
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncouragementKind {
    Welcome,
    AfterQuiz,
    Struggling,
    Milestone,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Encouragement {
    pub message: &'static str,
    #[serde(rename = "type")]
    pub kind: EncouragementKind,
    /// Percentage over the last 20 attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_accuracy: Option<f64>,
}

pub fn encourage(snapshot: &UserSnapshot, context: EncouragementContext) -> Encouragement {
    let attempts = &snapshot.attempts;
    let recent = Tally::from_attempts(&attempts[attempts.len().saturating_sub(RECENT_ATTEMPTS)..]);
    let Some(accuracy) = recent.accuracy() else {
        return Encouragement {
            message: "Welcome! Every expert was once a beginner. Let's start your test prep journey together!",
            kind: EncouragementKind::Welcome,
            recent_accuracy: None,
        };
    };

    let (message, kind) = match context {
        EncouragementContext::AfterQuiz => {
            let message = if accuracy >= 0.85 {
                "Outstanding work! You're really mastering this material. Keep up this excellent momentum!"
            } else if accuracy >= 0.70 {
                "Great progress! You're on the right track. With continued practice, you'll reach your target score."
            } else if accuracy >= 0.50 {
                "Good effort! Remember, every mistake is a learning opportunity. Review the explanations and try again."
            } else {
                "Don't get discouraged! This material takes time to master. Focus on understanding one topic at a time."
            };
            (message, EncouragementKind::AfterQuiz)
        }
        EncouragementContext::Struggling => (
            "Challenges are what make you stronger. Take a break if needed, then come back fresh. You've got this!",
            EncouragementKind::Struggling,
        ),
        EncouragementContext::Milestone => (
            "🎉 Congratulations on this achievement! Your dedication is paying off. Celebrate this win!",
            EncouragementKind::Milestone,
        ),
        EncouragementContext::General => (
            "Keep pushing forward! Consistent effort leads to remarkable results.",
            EncouragementKind::General,
        ),
    };

    Encouragement {
        message,
        kind,
        recent_accuracy: as_percent(Some(accuracy)),
    }
}

pub async fn generate_encouragement(
    state: &AppState,
    user_id: &str,
    context: EncouragementContext,
) -> Result<Encouragement, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    Ok(encourage(&snapshot, context))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use prepcoach_algo::AttemptRecord;

    use super::*;
    use crate::store::UserProfile;

    fn snapshot(results: &[bool]) -> UserSnapshot {
        UserSnapshot {
            profile: UserProfile::new("u1"),
            attempts: results
                .iter()
                .map(|&is_correct| AttemptRecord {
                    user_id: "u1".to_string(),
                    question_id: "q".to_string(),
                    is_correct,
                    timestamp: Utc::now(),
                    quiz_id: None,
                    answer: None,
                    time_spent_secs: None,
                })
                .collect(),
            test_results: Vec::new(),
        }
    }

    #[test]
    fn test_welcome_without_history() {
        let result = encourage(&snapshot(&[]), EncouragementContext::AfterQuiz);
        assert_eq!(result.kind, EncouragementKind::Welcome);
        assert_eq!(result.recent_accuracy, None);
    }

    #[test]
    fn test_after_quiz_uses_last_twenty() {
        // 10 old misses followed by 20 hits
        let mut results = vec![false; 10];
        results.extend(vec![true; 20]);
        let result = encourage(&snapshot(&results), EncouragementContext::AfterQuiz);
        assert_eq!(result.recent_accuracy, Some(100.0));
        assert!(result.message.starts_with("Outstanding work!"));
    }

    #[test]
    fn test_after_quiz_low_accuracy() {
        let result = encourage(&snapshot(&[true, false, false, false]), EncouragementContext::AfterQuiz);
        assert!(result.message.starts_with("Don't get discouraged!"));
        assert_eq!(result.recent_accuracy, Some(25.0));
    }
}
