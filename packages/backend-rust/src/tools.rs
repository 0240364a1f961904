//! The closed set of operations the chat model may call.
//!
//! A model tool call is parsed into a [`ToolCall`] with typed parameters,
//! validated, then executed against the store for the user the orchestrator
//! names. A user id supplied by the model is never used.

use chrono::{DateTime, Utc};
use prepcoach_algo::quiz::MAX_QUIZ_SIZE;
use prepcoach_algo::Timeframe;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::services::explanations::{self, QuestionExplanation};
use crate::services::motivation::{self, Encouragement, EncouragementContext};
use crate::services::performance::{
    self, BarChart, ComparisonType, ErrorPatternsView, ProgressComparison, TopicAnalysis,
};
use crate::services::profile::{self, ProfileUpdate, ProfileUpdateResult, ProfileView};
use crate::services::progress::{self, LearningHistory, ProgressSummary, StreakView, MAX_HISTORY_DAYS};
use crate::services::quiz::{self, GenerateQuizRequest, GeneratedQuiz};
use crate::services::recommendations::{self, StudyRecommendations};
use crate::services::ServiceError;
use crate::state::AppState;
use crate::store::PracticeTestResult;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

// ==================== Parameters ====================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoParams {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileParams {
    #[serde(default)]
    pub updates: ProfileUpdate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestParams {
    pub test_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicAnalysisParams {
    pub section: Option<String>,
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPatternParams {
    pub question_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompareParams {
    pub comparison_type: Option<ComparisonType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdaptiveQuizParams {
    pub size: Option<usize>,
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplanationParams {
    pub question_id: String,
    pub detailed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncouragementParams {
    pub context: Option<EncouragementContext>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "tool", content = "params", rename_all = "snake_case")]
pub enum ToolCall {
    GetUserProfile(NoParams),
    UpdateUserProfile(UpdateProfileParams),
    GetLearningHistory(HistoryParams),
    GetLatestTestResults(TestParams),
    AnalyzePerformanceByTopic(TopicAnalysisParams),
    IdentifyErrorPatterns(ErrorPatternParams),
    CompareProgress(CompareParams),
    GenerateAdaptiveQuiz(AdaptiveQuizParams),
    GenerateStudyRecommendations(NoParams),
    GetProgressSummary(NoParams),
    TrackStudyStreak(NoParams),
    GetQuestionExplanation(ExplanationParams),
    GenerateEncouragement(EncouragementParams),
    GenerateBarChartData(TestParams),
}

pub const TOOL_NAMES: [&str; 14] = [
    "get_user_profile",
    "update_user_profile",
    "get_learning_history",
    "get_latest_test_results",
    "analyze_performance_by_topic",
    "identify_error_patterns",
    "compare_progress",
    "generate_adaptive_quiz",
    "generate_study_recommendations",
    "get_progress_summary",
    "track_study_streak",
    "get_question_explanation",
    "generate_encouragement",
    "generate_bar_chart_data",
];

impl ToolCall {
    /// Parses a model tool call. Empty arguments mean no parameters.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolError> {
        if !TOOL_NAMES.contains(&name) {
            return Err(ToolError::UnknownTool(name.to_string()));
        }
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: name.to_string(),
            reason,
        };

        let params: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments).map_err(|e| invalid(e.to_string()))?
        };
        if !params.is_object() {
            return Err(invalid("arguments must be a JSON object".to_string()));
        }

        let call: ToolCall = serde_json::from_value(json!({ "tool": name, "params": params }))
            .map_err(|e| invalid(e.to_string()))?;
        call.validate()?;
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetUserProfile(_) => "get_user_profile",
            ToolCall::UpdateUserProfile(_) => "update_user_profile",
            ToolCall::GetLearningHistory(_) => "get_learning_history",
            ToolCall::GetLatestTestResults(_) => "get_latest_test_results",
            ToolCall::AnalyzePerformanceByTopic(_) => "analyze_performance_by_topic",
            ToolCall::IdentifyErrorPatterns(_) => "identify_error_patterns",
            ToolCall::CompareProgress(_) => "compare_progress",
            ToolCall::GenerateAdaptiveQuiz(_) => "generate_adaptive_quiz",
            ToolCall::GenerateStudyRecommendations(_) => "generate_study_recommendations",
            ToolCall::GetProgressSummary(_) => "get_progress_summary",
            ToolCall::TrackStudyStreak(_) => "track_study_streak",
            ToolCall::GetQuestionExplanation(_) => "get_question_explanation",
            ToolCall::GenerateEncouragement(_) => "generate_encouragement",
            ToolCall::GenerateBarChartData(_) => "generate_bar_chart_data",
        }
    }

    pub fn validate(&self) -> Result<(), ToolError> {
        let invalid = |reason: &str| {
            Err(ToolError::InvalidArguments {
                tool: self.name().to_string(),
                reason: reason.to_string(),
            })
        };
        match self {
            ToolCall::GetLearningHistory(HistoryParams { days: Some(days) })
                if *days == 0 || *days > MAX_HISTORY_DAYS =>
            {
                invalid("days must be between 1 and 365")
            }
            ToolCall::GenerateAdaptiveQuiz(AdaptiveQuizParams { size: Some(size), .. })
                if *size == 0 || *size > MAX_QUIZ_SIZE =>
            {
                invalid("size must be between 1 and 50")
            }
            ToolCall::GenerateAdaptiveQuiz(AdaptiveQuizParams {
                topics: Some(topics),
                ..
            }) if topics.iter().any(|t| t.trim().is_empty()) => invalid("topics must not be blank"),
            ToolCall::GetQuestionExplanation(params) if params.question_id.trim().is_empty() => {
                invalid("question_id is required")
            }
            ToolCall::IdentifyErrorPatterns(ErrorPatternParams {
                question_ids: Some(ids),
            }) if ids.is_empty() => invalid("question_ids must not be empty when given"),
            _ => Ok(()),
        }
    }

    pub async fn execute(
        self,
        state: &AppState,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ToolOutput, ToolError> {
        let output = match self {
            ToolCall::GetUserProfile(_) => {
                ToolOutput::Profile(profile::get_profile(state, user_id, now).await?)
            }
            ToolCall::UpdateUserProfile(params) => ToolOutput::ProfileUpdated(
                profile::update_profile(state, user_id, params.updates, now).await?,
            ),
            ToolCall::GetLearningHistory(params) => ToolOutput::History(
                progress::learning_history(state, user_id, params.days, now).await?,
            ),
            ToolCall::GetLatestTestResults(params) => ToolOutput::TestResult(
                performance::latest_test_results(state, user_id, params.test_id.as_deref()).await?,
            ),
            ToolCall::AnalyzePerformanceByTopic(params) => {
                ToolOutput::TopicAnalysis(
                    performance::analyze_by_topic(
                        state,
                        user_id,
                        params.timeframe.unwrap_or_default(),
                        params.section.as_deref(),
                        now,
                    )
                    .await?,
                )
            }
            ToolCall::IdentifyErrorPatterns(params) => ToolOutput::ErrorPatterns(
                performance::identify_error_patterns(state, user_id, params.question_ids.as_deref())
                    .await?,
            ),
            ToolCall::CompareProgress(params) => ToolOutput::Comparison(
                performance::compare_progress(state, user_id, params.comparison_type.unwrap_or_default())
                    .await?,
            ),
            ToolCall::GenerateAdaptiveQuiz(params) => {
                let request = GenerateQuizRequest {
                    question_count: params.size,
                    topic_filter: params.topics,
                };
                ToolOutput::Quiz(quiz::generate(state, user_id, request, now).await?)
            }
            ToolCall::GenerateStudyRecommendations(_) => ToolOutput::Recommendations(
                recommendations::study_recommendations(state, user_id, now).await?,
            ),
            ToolCall::GetProgressSummary(_) => {
                ToolOutput::Progress(progress::progress_summary(state, user_id, now).await?)
            }
            ToolCall::TrackStudyStreak(_) => {
                ToolOutput::Streak(progress::track_streak(state, user_id, now).await?)
            }
            ToolCall::GetQuestionExplanation(params) => {
                ToolOutput::Explanation(explanations::question_explanation(
                    state,
                    params.question_id.trim(),
                    params.detailed.unwrap_or(true),
                )?)
            }
            ToolCall::GenerateEncouragement(params) => ToolOutput::Encouragement(
                motivation::generate_encouragement(state, user_id, params.context.unwrap_or_default())
                    .await?,
            ),
            ToolCall::GenerateBarChartData(params) => ToolOutput::BarChart(
                performance::bar_chart_data(state, user_id, params.test_id.as_deref()).await?,
            ),
        };
        Ok(output)
    }
}

// ==================== Results ====================

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Profile(ProfileView),
    ProfileUpdated(ProfileUpdateResult),
    History(LearningHistory),
    TestResult(PracticeTestResult),
    TopicAnalysis(TopicAnalysis),
    ErrorPatterns(ErrorPatternsView),
    Comparison(ProgressComparison),
    Quiz(GeneratedQuiz),
    Recommendations(StudyRecommendations),
    Progress(ProgressSummary),
    Streak(StreakView),
    Explanation(QuestionExplanation),
    Encouragement(Encouragement),
    BarChart(BarChart),
}

impl ToolOutput {
    /// Tool result content as sent back to the model.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }
}

// ==================== Definitions ====================

fn function(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        }
    })
}

/// JSON-schema tool definitions sent to the model with every request.
pub fn definitions() -> Vec<Value> {
    let test_id = json!({
        "test_id": {"type": "string", "description": "Specific test id; defaults to the most recent test"}
    });
    vec![
        function(
            "get_user_profile",
            "Get the learner's profile: target test, target and baseline scores, test date, study preferences.",
            json!({}),
            &[],
        ),
        function(
            "update_user_profile",
            "Update the learner's goals or preferences. The user id and email cannot be changed.",
            json!({
                "updates": {
                    "type": "object",
                    "description": "Fields to update",
                    "properties": {
                        "name": {"type": "string"},
                        "test_type": {"type": "string"},
                        "target_score": {"type": "integer", "minimum": 1},
                        "baseline_score": {"type": "integer", "minimum": 0},
                        "current_level": {"type": "string"},
                        "study_hours_per_week": {"type": "integer", "minimum": 0, "maximum": 168},
                        "test_date": {"type": "string", "format": "date"},
                        "preferences": {"type": "object"},
                        "utc_offset_minutes": {"type": "integer", "minimum": -840, "maximum": 840}
                    }
                }
            }),
            &["updates"],
        ),
        function(
            "get_learning_history",
            "Practice activity over the last N days: questions attempted, accuracy, topics, streak.",
            json!({"days": {"type": "integer", "minimum": 1, "maximum": 365, "default": 30}}),
            &[],
        ),
        function(
            "get_latest_test_results",
            "Scores of the most recent practice test, or of a specific test, with per-section scores.",
            test_id.clone(),
            &[],
        ),
        function(
            "analyze_performance_by_topic",
            "Accuracy by topic and subtopic, weakest first, with trend.",
            json!({
                "section": {"type": "string", "description": "Section to analyze, e.g. math, reading, writing"},
                "timeframe": {"type": "string", "enum": ["week", "month", "all"], "default": "all"}
            }),
            &[],
        ),
        function(
            "identify_error_patterns",
            "Analyze wrong answers: topics with most errors, errors by difficulty, signs of rushing.",
            json!({"question_ids": {"type": "array", "items": {"type": "string"}}}),
            &[],
        ),
        function(
            "compare_progress",
            "Compare the latest practice test with the previous one or with the target score.",
            json!({"comparison_type": {"type": "string", "enum": ["historical", "target"], "default": "historical"}}),
            &[],
        ),
        function(
            "generate_adaptive_quiz",
            "Create a practice quiz weighted toward weak topics with a 30/50/20 easy/medium/hard mix.",
            json!({
                "size": {"type": "integer", "minimum": 1, "maximum": MAX_QUIZ_SIZE, "default": 20},
                "topics": {"type": "array", "items": {"type": "string"}, "description": "Restrict to these topics"}
            }),
            &[],
        ),
        function(
            "generate_study_recommendations",
            "Prioritized study recommendations from performance, activity and test date.",
            json!({}),
            &[],
        ),
        function(
            "get_progress_summary",
            "Overall progress: accuracy and trend, streak, milestones, weak and strong areas, scores.",
            json!({}),
            &[],
        ),
        function(
            "track_study_streak",
            "Current and longest streak of consecutive study days.",
            json!({}),
            &[],
        ),
        function(
            "get_question_explanation",
            "Explanation and correct answer for a question, with study tips when detailed.",
            json!({
                "question_id": {"type": "string"},
                "detailed": {"type": "boolean", "default": true}
            }),
            &["question_id"],
        ),
        function(
            "generate_encouragement",
            "A motivational message based on recent accuracy.",
            json!({"context": {"type": "string", "enum": ["after_quiz", "struggling", "milestone", "general"], "default": "general"}}),
            &[],
        ),
        function(
            "generate_bar_chart_data",
            "Bar chart data of section scores for a practice test.",
            test_id,
            &[],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::DEMO_USER_ID;
    use crate::services::test_support::seeded_state;

    #[test]
    fn test_definitions_match_names() {
        let names: Vec<String> = definitions()
            .iter()
            .map(|d| d["function"]["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, TOOL_NAMES.to_vec());
    }

    #[test]
    fn test_parse_every_tool_without_arguments() {
        for name in TOOL_NAMES {
            let result = ToolCall::parse(name, "");
            if name == "get_question_explanation" {
                assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
            } else {
                assert_eq!(result.unwrap().name(), name);
            }
        }
    }

    #[test]
    fn test_parse_ignores_model_user_id() {
        let call = ToolCall::parse(
            "generate_adaptive_quiz",
            r#"{"user_id": "someone-else", "size": 5, "topics": ["algebra"]}"#,
        )
        .unwrap();
        let ToolCall::GenerateAdaptiveQuiz(params) = call else {
            panic!("wrong variant");
        };
        assert_eq!(params.size, Some(5));
        assert_eq!(params.topics, Some(vec!["algebra".to_string()]));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            ToolCall::parse("delete_everything", "{}"),
            Err(ToolError::UnknownTool(_))
        ));
        assert!(matches!(
            ToolCall::parse("generate_adaptive_quiz", r#"{"size": 500}"#),
            Err(ToolError::InvalidArguments { .. })
        ));
        assert!(matches!(
            ToolCall::parse("analyze_performance_by_topic", r#"{"timeframe": "decade"}"#),
            Err(ToolError::InvalidArguments { .. })
        ));
        assert!(matches!(
            ToolCall::parse("get_learning_history", "[1, 2]"),
            Err(ToolError::InvalidArguments { .. })
        ));
        assert!(matches!(
            ToolCall::parse("get_learning_history", "{not json"),
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_quiz_tool_persists_quiz() {
        let state = seeded_state().await;
        let call = ToolCall::parse("generate_adaptive_quiz", r#"{"size": 5}"#).unwrap();
        let ToolOutput::Quiz(quiz) = call.execute(&state, DEMO_USER_ID, Utc::now()).await.unwrap()
        else {
            panic!("expected quiz output");
        };
        assert_eq!(quiz.total_questions, 5);
        assert!(state.store().get_quiz(DEMO_USER_ID, &quiz.quiz_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_unknown_user() {
        let state = seeded_state().await;
        let call = ToolCall::parse("get_progress_summary", "{}").unwrap();
        assert!(matches!(
            call.execute(&state, "ghost", Utc::now()).await,
            Err(ToolError::Service(ServiceError::Store(_)))
        ));
    }

    #[tokio::test]
    async fn test_output_serializes_flat() {
        let state = seeded_state().await;
        let call = ToolCall::parse("track_study_streak", "").unwrap();
        let output = call.execute(&state, DEMO_USER_ID, Utc::now()).await.unwrap();
        let json = output.to_json();
        assert_eq!(json["current_streak"], 10);
        assert!(json["streak_status"].is_string());
    }
}
