use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use prepcoach_algo::AttemptRecord;

use super::{
    AppendedAttempts, ConversationMessage, PracticeTestResult, ProfileEdit, StoreError,
    StoredQuiz, StudyStore, UserProfile, UserSnapshot,
};

/// Unsubmitted quizzes and submitted-quiz markers older than this are dropped.
pub const DEFAULT_QUIZ_TTL_HOURS: i64 = 24;
/// Sessions with no message for this long are dropped.
pub const DEFAULT_SESSION_IDLE_HOURS: i64 = 24;

#[derive(Debug)]
struct UserRecord {
    profile: UserProfile,
    attempts: Vec<AttemptRecord>,
    test_results: Vec<PracticeTestResult>,
}

impl UserRecord {
    fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            profile: self.profile.clone(),
            attempts: self.attempts.clone(),
            test_results: self.test_results.clone(),
        }
    }
}

/// A submitted quiz keeps only what is needed to answer `QuizConsumed`.
#[derive(Debug)]
enum QuizEntry {
    Open(StoredQuiz),
    Submitted {
        user_id: String,
        created_at: DateTime<Utc>,
    },
}

impl QuizEntry {
    fn owner(&self) -> &str {
        match self {
            QuizEntry::Open(quiz) => &quiz.user_id,
            QuizEntry::Submitted { user_id, .. } => user_id,
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        match self {
            QuizEntry::Open(quiz) => quiz.created_at,
            QuizEntry::Submitted { created_at, .. } => *created_at,
        }
    }
}

#[derive(Debug)]
struct Session {
    user_id: String,
    messages: Vec<ConversationMessage>,
    last_activity: DateTime<Utc>,
}

/// Process-lifetime store. Each user record sits behind its own lock so
/// writers for one user never block readers of another.
///
/// Quizzes and sessions are pruned by age whenever a new one is written,
/// using the incoming record's timestamp as the clock.
#[derive(Debug)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, Arc<RwLock<UserRecord>>>>,
    quizzes: Mutex<HashMap<String, QuizEntry>>,
    sessions: Mutex<HashMap<String, Session>>,
    quiz_ttl: Duration,
    session_idle: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_retention(
            Duration::hours(DEFAULT_QUIZ_TTL_HOURS),
            Duration::hours(DEFAULT_SESSION_IDLE_HOURS),
        )
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(quiz_ttl: Duration, session_idle: Duration) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            quizzes: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            quiz_ttl,
            session_idle,
        }
    }

    fn user(&self, user_id: &str) -> Result<Arc<RwLock<UserRecord>>, StoreError> {
        self.users
            .read()
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))
    }
}

#[async_trait]
impl StudyStore for InMemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let record = self.user(user_id)?;
        let profile = record.read().profile.clone();
        Ok(profile)
    }

    async fn put_profile(&self, profile: UserProfile) -> Result<(), StoreError> {
        let existing = self.users.read().get(&profile.user_id).cloned();
        match existing {
            Some(record) => record.write().profile = profile,
            None => {
                let mut users = self.users.write();
                let record = users.entry(profile.user_id.clone()).or_insert_with(|| {
                    Arc::new(RwLock::new(UserRecord {
                        profile: profile.clone(),
                        attempts: Vec::new(),
                        test_results: Vec::new(),
                    }))
                });
                record.write().profile = profile;
            }
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        edit: ProfileEdit,
    ) -> Result<UserSnapshot, StoreError> {
        let record = self.user(user_id)?;
        let mut guard = record.write();
        edit(&mut guard.profile);
        Ok(guard.snapshot())
    }

    async fn snapshot(&self, user_id: &str) -> Result<UserSnapshot, StoreError> {
        let record = self.user(user_id)?;
        let snapshot = record.read().snapshot();
        Ok(snapshot)
    }

    async fn append_attempts(
        &self,
        user_id: &str,
        attempts: Vec<AttemptRecord>,
    ) -> Result<AppendedAttempts, StoreError> {
        let record = self.user(user_id)?;
        let mut guard = record.write();
        let previous_len = guard.attempts.len();
        guard.attempts.extend(attempts);
        Ok(AppendedAttempts {
            previous_len,
            snapshot: guard.snapshot(),
        })
    }

    async fn append_test_result(
        &self,
        user_id: &str,
        result: PracticeTestResult,
    ) -> Result<(), StoreError> {
        let record = self.user(user_id)?;
        record.write().test_results.push(result);
        Ok(())
    }

    async fn save_quiz(&self, quiz: StoredQuiz) -> Result<(), StoreError> {
        let cutoff = quiz.created_at - self.quiz_ttl;
        let mut quizzes = self.quizzes.lock();
        let before = quizzes.len();
        quizzes.retain(|_, entry| entry.created_at() >= cutoff);
        let pruned = before - quizzes.len();
        if pruned > 0 {
            tracing::debug!(pruned, "expired quizzes dropped");
        }
        quizzes.insert(quiz.quiz_id.clone(), QuizEntry::Open(quiz));
        Ok(())
    }

    async fn get_quiz(&self, user_id: &str, quiz_id: &str) -> Result<StoredQuiz, StoreError> {
        let quizzes = self.quizzes.lock();
        match quizzes.get(quiz_id) {
            Some(QuizEntry::Open(quiz)) if quiz.user_id == user_id => Ok(quiz.clone()),
            Some(QuizEntry::Submitted { user_id: owner, .. }) if owner == user_id => {
                Err(StoreError::QuizConsumed(quiz_id.to_string()))
            }
            _ => Err(StoreError::QuizNotFound(quiz_id.to_string())),
        }
    }

    async fn consume_quiz(&self, user_id: &str, quiz_id: &str) -> Result<StoredQuiz, StoreError> {
        let mut quizzes = self.quizzes.lock();
        let Some(entry) = quizzes.get_mut(quiz_id).filter(|e| e.owner() == user_id) else {
            return Err(StoreError::QuizNotFound(quiz_id.to_string()));
        };
        let marker = QuizEntry::Submitted {
            user_id: user_id.to_string(),
            created_at: entry.created_at(),
        };
        match std::mem::replace(entry, marker) {
            QuizEntry::Open(quiz) => Ok(quiz),
            submitted => {
                *entry = submitted;
                Err(StoreError::QuizConsumed(quiz_id.to_string()))
            }
        }
    }

    async fn session_messages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, StoreError> {
        let sessions = self.sessions.lock();
        match sessions.get(session_id) {
            None => Ok(Vec::new()),
            Some(session) if session.user_id == user_id => Ok(session.messages.clone()),
            Some(_) => Err(StoreError::SessionNotFound(session_id.to_string())),
        }
    }

    async fn append_messages(
        &self,
        user_id: &str,
        messages: Vec<ConversationMessage>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock();
        if let Some(latest) = messages.iter().map(|m| m.timestamp).max() {
            let cutoff = latest - self.session_idle;
            sessions.retain(|_, session| session.last_activity >= cutoff);
        }

        // Ownership is checked for every message before any is written.
        if let Some(foreign) = messages.iter().find(|m| {
            sessions
                .get(&m.session_id)
                .is_some_and(|session| session.user_id != user_id)
        }) {
            return Err(StoreError::SessionNotFound(foreign.session_id.clone()));
        }

        for message in messages {
            let session = sessions
                .entry(message.session_id.clone())
                .or_insert_with(|| Session {
                    user_id: user_id.to_string(),
                    messages: Vec::new(),
                    last_activity: message.timestamp,
                });
            session.last_activity = session.last_activity.max(message.timestamp);
            session.messages.push(message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MessageRole;
    use prepcoach_algo::DifficultyDistribution;

    fn message(session_id: &str, timestamp: DateTime<Utc>) -> ConversationMessage {
        ConversationMessage {
            session_id: session_id.to_string(),
            role: MessageRole::User,
            content: "hi".to_string(),
            tools_used: vec![],
            timestamp,
        }
    }

    fn attempt(user_id: &str, question_id: &str) -> AttemptRecord {
        AttemptRecord {
            user_id: user_id.to_string(),
            question_id: question_id.to_string(),
            is_correct: true,
            timestamp: Utc::now(),
            quiz_id: None,
            answer: None,
            time_spent_secs: None,
        }
    }

    fn quiz(quiz_id: &str, user_id: &str) -> StoredQuiz {
        StoredQuiz {
            quiz_id: quiz_id.to_string(),
            user_id: user_id.to_string(),
            question_ids: vec!["q1".to_string()],
            distribution: DifficultyDistribution::default(),
            partial: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.get_profile("ghost").await,
            Err(StoreError::UserNotFound("ghost".to_string()))
        );
        assert!(store.append_attempts("ghost", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_append_reports_previous_length() {
        let store = InMemoryStore::new();
        store.put_profile(UserProfile::new("u1")).await.unwrap();

        let first = store
            .append_attempts("u1", vec![attempt("u1", "q1"), attempt("u1", "q2")])
            .await
            .unwrap();
        assert_eq!(first.previous_len, 0);
        let second = store.append_attempts("u1", vec![attempt("u1", "q3")]).await.unwrap();
        assert_eq!(second.previous_len, 2);
        assert_eq!(second.snapshot.attempts.len(), 3);

        let snapshot = store.snapshot("u1").await.unwrap();
        let ids: Vec<_> = snapshot.attempts.iter().map(|a| a.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
    }

    #[tokio::test]
    async fn test_put_profile_keeps_history() {
        let store = InMemoryStore::new();
        store.put_profile(UserProfile::new("u1")).await.unwrap();
        store.append_attempts("u1", vec![attempt("u1", "q1")]).await.unwrap();

        let mut profile = store.get_profile("u1").await.unwrap();
        profile.target_score = Some(1400);
        store.put_profile(profile).await.unwrap();

        let snapshot = store.snapshot("u1").await.unwrap();
        assert_eq!(snapshot.profile.target_score, Some(1400));
        assert_eq!(snapshot.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_quiz_consumed_once() {
        let store = InMemoryStore::new();
        store.save_quiz(quiz("quiz-1", "u1")).await.unwrap();

        assert_eq!(
            store.consume_quiz("u2", "quiz-1").await,
            Err(StoreError::QuizNotFound("quiz-1".to_string()))
        );
        assert!(store.consume_quiz("u1", "quiz-1").await.is_ok());
        assert_eq!(
            store.consume_quiz("u1", "quiz-1").await,
            Err(StoreError::QuizConsumed("quiz-1".to_string()))
        );
        assert_eq!(
            store.get_quiz("u1", "quiz-1").await,
            Err(StoreError::QuizConsumed("quiz-1".to_string()))
        );
        assert_eq!(
            store.get_quiz("u2", "quiz-1").await,
            Err(StoreError::QuizNotFound("quiz-1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_expired_quizzes_are_pruned() {
        let store = InMemoryStore::with_retention(Duration::hours(1), Duration::hours(1));
        let mut old = quiz("quiz-old", "u1");
        old.created_at = Utc::now() - Duration::hours(2);
        store.save_quiz(old).await.unwrap();
        store.save_quiz(quiz("quiz-used", "u1")).await.unwrap();
        store.consume_quiz("u1", "quiz-used").await.unwrap();

        store.save_quiz(quiz("quiz-new", "u1")).await.unwrap();
        assert_eq!(
            store.get_quiz("u1", "quiz-old").await,
            Err(StoreError::QuizNotFound("quiz-old".to_string()))
        );
        assert!(store.get_quiz("u1", "quiz-new").await.is_ok());
        assert_eq!(store.quizzes.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_pruned() {
        let store = InMemoryStore::with_retention(Duration::hours(1), Duration::hours(1));
        let now = Utc::now();
        let mut stale = message("s-old", now - Duration::hours(3));
        store.append_messages("u1", vec![stale.clone()]).await.unwrap();
        store.append_messages("u1", vec![message("s-new", now)]).await.unwrap();

        assert!(store.session_messages("u1", "s-old").await.unwrap().is_empty());
        assert_eq!(store.session_messages("u1", "s-new").await.unwrap().len(), 1);

        // an expired id can be taken by anyone afterwards
        stale.timestamp = now;
        assert!(store.append_messages("u2", vec![stale]).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_profile_edits_in_place() {
        let store = InMemoryStore::new();
        store.put_profile(UserProfile::new("u1")).await.unwrap();
        store.append_attempts("u1", vec![attempt("u1", "q1")]).await.unwrap();

        let snapshot = store
            .update_profile("u1", Box::new(|profile| profile.target_score = Some(1300)))
            .await
            .unwrap();
        assert_eq!(snapshot.profile.target_score, Some(1300));
        assert_eq!(snapshot.attempts.len(), 1);

        let missing = store
            .update_profile("ghost", Box::new(|profile| profile.target_score = Some(1)))
            .await;
        assert!(matches!(missing, Err(StoreError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_sessions_are_owned() {
        let store = InMemoryStore::new();
        let message = message("s1", Utc::now());
        store.append_messages("u1", vec![message.clone()]).await.unwrap();

        assert_eq!(store.session_messages("u1", "s1").await.unwrap().len(), 1);
        assert!(store.session_messages("u1", "missing").await.unwrap().is_empty());
        assert_eq!(
            store.session_messages("u2", "s1").await,
            Err(StoreError::SessionNotFound("s1".to_string()))
        );
        assert!(store.append_messages("u2", vec![message.clone()]).await.is_err());

        // a batch touching a foreign session writes nothing
        let mut mixed = message.clone();
        mixed.session_id = "s2".to_string();
        assert!(store.append_messages("u2", vec![mixed, message]).await.is_err());
        assert!(store.session_messages("u2", "s2").await.unwrap().is_empty());
    }
}
