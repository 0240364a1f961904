use std::collections::HashSet;

use chrono::{DateTime, Utc};
use prepcoach_algo::{
    aggregate, as_percent, evaluate_milestones, generate_quiz, quiz_rng, AttemptRecord,
    Difficulty, DifficultyDistribution, Milestone, QuizRequest, Trend,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{user_offset, ServiceError};
use crate::state::AppState;
use crate::store::StoredQuiz;

// ==================== Generation ====================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateQuizRequest {
    #[serde(default)]
    pub question_count: Option<usize>,
    #[serde(default)]
    pub topic_filter: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizQuestion {
    pub question_number: usize,
    pub question_id: String,
    pub content: String,
    pub options: Vec<String>,
    pub topic: String,
    pub subtopic: String,
    pub difficulty: Difficulty,
    pub estimated_time_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedQuiz {
    pub quiz_id: String,
    pub created_at: DateTime<Utc>,
    pub requested: usize,
    pub total_questions: usize,
    pub partial: bool,
    pub distribution: DifficultyDistribution,
    pub focus_areas: Vec<String>,
    pub relaxed_exclusions: usize,
    pub questions: Vec<QuizQuestion>,
}

pub async fn generate(
    state: &AppState,
    user_id: &str,
    request: GenerateQuizRequest,
    now: DateTime<Utc>,
) -> Result<GeneratedQuiz, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    let bank = state.bank();

    let topic_filter = request
        .topic_filter
        .map(|topics| {
            topics
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|topics| !topics.is_empty());
    let quiz_request = QuizRequest {
        count: request
            .question_count
            .unwrap_or(state.settings().default_quiz_size),
        topic_filter,
    };

    let selection = {
        let mut rng = quiz_rng(None);
        generate_quiz(
            bank,
            &snapshot.attempts,
            &quiz_request,
            &state.settings().quiz,
            &mut rng,
        )?
    };

    let quiz_id = Uuid::new_v4().to_string();
    state
        .store()
        .save_quiz(StoredQuiz {
            quiz_id: quiz_id.clone(),
            user_id: user_id.to_string(),
            question_ids: selection.question_ids.clone(),
            distribution: selection.distribution,
            partial: selection.partial,
            created_at: now,
        })
        .await?;

    if selection.partial {
        tracing::warn!(
            user_id,
            requested = selection.requested,
            selected = selection.question_ids.len(),
            "partial quiz generated"
        );
    }
    tracing::info!(user_id, %quiz_id, questions = selection.question_ids.len(), "quiz generated");

    let questions = selection
        .question_ids
        .iter()
        .filter_map(|id| bank.get(id))
        .enumerate()
        .map(|(idx, q)| QuizQuestion {
            question_number: idx + 1,
            question_id: q.question_id.clone(),
            content: q.content.clone(),
            options: q.options.clone(),
            topic: q.topic.clone(),
            subtopic: q.subtopic.clone(),
            difficulty: q.difficulty,
            estimated_time_secs: q.average_time_secs,
        })
        .collect::<Vec<_>>();

    Ok(GeneratedQuiz {
        quiz_id,
        created_at: now,
        requested: selection.requested,
        total_questions: questions.len(),
        partial: selection.partial,
        distribution: selection.distribution,
        focus_areas: selection.weak_topics,
        relaxed_exclusions: selection.relaxed_exclusions,
        questions,
    })
}

// ==================== Submission ====================

/// Upper bound on the time reported for a single answer
pub const MAX_TIME_SPENT_SECS: u32 = 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct QuizAnswer {
    pub question_id: String,
    pub answer: String,
    /// Seconds spent on the question, at most [`MAX_TIME_SPENT_SECS`]
    #[serde(default)]
    pub time_spent: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitQuizRequest {
    #[serde(default)]
    pub quiz_id: Option<String>,
    pub responses: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl PerformanceLevel {
    pub fn from_percent(accuracy: f64) -> Self {
        if accuracy >= 85.0 {
            Self::Excellent
        } else if accuracy >= 70.0 {
            Self::Good
        } else if accuracy >= 60.0 {
            Self::Fair
        } else {
            Self::NeedsImprovement
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub your_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    /// Present on wrong answers only
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedStats {
    pub total_attempted: u32,
    pub overall_accuracy: Option<f64>,
    pub recent_accuracy: Option<f64>,
    pub trend: Option<Trend>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSubmission {
    pub quiz_id: String,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub accuracy: f64,
    pub performance_level: PerformanceLevel,
    pub total_time_secs: Option<u64>,
    pub average_time_secs: Option<f64>,
    pub results: Vec<QuestionResult>,
    pub updated_stats: UpdatedStats,
    pub new_milestones: Vec<Milestone>,
}

pub async fn submit(
    state: &AppState,
    user_id: &str,
    request: SubmitQuizRequest,
    now: DateTime<Utc>,
) -> Result<QuizSubmission, ServiceError> {
    state.store().get_profile(user_id).await?;
    validate_answers(state, user_id, &request).await?;

    let quiz_id = match request.quiz_id {
        Some(quiz_id) => {
            state.store().consume_quiz(user_id, &quiz_id).await?;
            quiz_id
        }
        None => Uuid::new_v4().to_string(),
    };

    let bank = state.bank();
    let mut results = Vec::with_capacity(request.responses.len());
    let mut attempts = Vec::with_capacity(request.responses.len());
    for response in request.responses {
        let Some(question) = bank.get(&response.question_id) else {
            continue;
        };
        let is_correct = question.is_correct_answer(&response.answer);
        attempts.push(AttemptRecord {
            user_id: user_id.to_string(),
            question_id: question.question_id.clone(),
            is_correct,
            timestamp: now,
            quiz_id: Some(quiz_id.clone()),
            answer: Some(response.answer.clone()),
            time_spent_secs: response.time_spent,
        });
        results.push(QuestionResult {
            question_id: question.question_id.clone(),
            topic: question.topic.clone(),
            difficulty: question.difficulty,
            your_answer: response.answer,
            correct_answer: question.correct_answer.clone(),
            is_correct,
            explanation: (!is_correct).then(|| question.explanation.clone()),
        });
    }

    let times: Vec<u64> = attempts
        .iter()
        .filter_map(|a| a.time_spent_secs)
        .map(u64::from)
        .collect();
    let total_time_secs = (!times.is_empty()).then(|| times.iter().sum::<u64>());
    let average_time_secs = total_time_secs
        .map(|total| (total as f64 / times.len() as f64 * 100.0).round() / 100.0);

    // Snapshot ends with this submission's attempts.
    let appended = state.store().append_attempts(user_id, attempts).await?;
    let snapshot = appended.snapshot;

    let report = aggregate(&snapshot.attempts, bank, &state.settings().aggregator);
    let milestones = evaluate_milestones(
        &snapshot.attempts,
        user_offset(&snapshot.profile),
        appended.previous_len,
    );

    let correct_answers = results.iter().filter(|r| r.is_correct).count();
    let accuracy = (correct_answers as f64 * 10_000.0 / results.len() as f64).round() / 100.0;

    tracing::info!(
        user_id,
        %quiz_id,
        answered = results.len(),
        correct = correct_answers,
        new_milestones = milestones.new.len(),
        "quiz submitted"
    );

    Ok(QuizSubmission {
        quiz_id,
        total_questions: results.len(),
        correct_answers,
        accuracy,
        performance_level: PerformanceLevel::from_percent(accuracy),
        total_time_secs,
        average_time_secs,
        results,
        updated_stats: UpdatedStats {
            total_attempted: report.total_attempted,
            overall_accuracy: as_percent(report.overall_accuracy),
            recent_accuracy: as_percent(report.recent_accuracy),
            trend: report.trend,
        },
        new_milestones: milestones.new,
    })
}

/// Rejects the whole submission before anything is recorded.
async fn validate_answers(
    state: &AppState,
    user_id: &str,
    request: &SubmitQuizRequest,
) -> Result<(), ServiceError> {
    if request.responses.is_empty() {
        return Err(ServiceError::Validation("responses must not be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for response in &request.responses {
        if response.time_spent.is_some_and(|secs| secs > MAX_TIME_SPENT_SECS) {
            return Err(ServiceError::Validation(format!(
                "time_spent for {} must be at most {MAX_TIME_SPENT_SECS} seconds",
                response.question_id
            )));
        }
        if state.bank().get(&response.question_id).is_none() {
            return Err(ServiceError::Validation(format!(
                "unknown question {}",
                response.question_id
            )));
        }
        if !seen.insert(response.question_id.as_str()) {
            return Err(ServiceError::Validation(format!(
                "question {} answered more than once",
                response.question_id
            )));
        }
    }

    if let Some(quiz_id) = request.quiz_id.as_deref() {
        let quiz = state.store().get_quiz(user_id, quiz_id).await?;
        if let Some(stray) = request
            .responses
            .iter()
            .find(|r| !quiz.question_ids.contains(&r.question_id))
        {
            return Err(ServiceError::Validation(format!(
                "question {} is not part of quiz {quiz_id}",
                stray.question_id
            )));
        }
    }
    Ok(())
}
