//! One chat turn: context assembly, the tool-calling loop, and persistence
//! of the exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::services::llm_provider::{ChatMessage, LLMError};
use crate::services::profile::ProfileView;
use crate::services::{progress, ServiceError};
use crate::state::AppState;
use crate::store::{ConversationMessage, MessageRole};
use crate::tools::{definitions, ToolCall, ToolOutput};
use crate::ui::UiElements;

pub const MAX_CONTEXT_MESSAGES: usize = 10;
pub const MAX_TOOL_ROUNDS: usize = 5;
const MAX_FOLLOW_UPS: usize = 2;

const APOLOGY: &str =
    "I'm sorry, I'm having trouble reaching my coaching assistant right now. Please try again in a moment.";
const WELCOME_FOLLOW_UP: &str = "What would you like to work on today?";
const WELCOME_TOOLS: [&str; 2] = ["get_user_profile", "get_progress_summary"];
const UNFINISHED_REPLY: &str =
    "I pulled together your study data but couldn't finish my answer. Could you ask again?";

const SYSTEM_PROMPT: &str = "You are an expert test preparation coach for standardized tests such as the SAT, GRE and GMAT.

You help the student by analyzing their performance, recommending what to study, generating adaptive practice quizzes, explaining questions, tracking progress and keeping them motivated.

Always use the available tools to read the student's actual data before making claims about scores, accuracy or progress. Never guess results.
- Questions about test scores or exams: call get_latest_test_results.
- Requests to analyze a test: call get_latest_test_results, then analyze_performance_by_topic and generate_bar_chart_data.
- Questions about progress: call get_progress_summary.
- How to improve: call identify_error_patterns and generate_study_recommendations.
- Practice questions or a quiz: call generate_adaptive_quiz.

If a tool returns an object with an \"error\" field, the data is missing; say so plainly and offer an alternative such as a practice quiz. If a tool returns data, use the numbers it contains.

Be warm and encouraging, and keep answers to a few sentences unless more detail is requested. Use Markdown: bold scores, section names and key metrics, and use bullet lists for multiple items.";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMetadata {
    pub timestamp: DateTime<Utc>,
    pub tool_calls_made: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_welcome: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub session_id: String,
    pub response: String,
    pub follow_ups: Vec<&'static str>,
    pub tools_used: Vec<String>,
    pub ui_elements: UiElements,
    pub metadata: ChatMetadata,
}

#[derive(Debug, Default)]
struct LoopOutcome {
    text: String,
    tools_used: Vec<String>,
    outputs: Vec<ToolOutput>,
    calls_made: usize,
}

impl LoopOutcome {
    fn record(&mut self, name: &str) {
        self.calls_made += 1;
        if !self.tools_used.iter().any(|used| used == name) {
            self.tools_used.push(name.to_string());
        }
    }
}

pub fn follow_ups(tools_used: &[String]) -> Vec<&'static str> {
    let used = |name: &str| tools_used.iter().any(|t| t == name);
    let mut follow_ups = Vec::new();
    if used("analyze_performance_by_topic") {
        follow_ups.push("Would you like me to create a practice quiz focused on your weak areas?");
    }
    if used("generate_adaptive_quiz") {
        follow_ups.push("Ready to start the quiz whenever you are!");
    }
    if used("get_latest_test_results") {
        follow_ups.push("Want to see how this compares to your previous attempts?");
    }
    if used("get_progress_summary") {
        follow_ups.push("Would you like specific recommendations to improve further?");
    }
    follow_ups.truncate(MAX_FOLLOW_UPS);
    follow_ups
}

/// Context for the model: system prompt, the tail of the session, the new
/// message. System entries of the session are not replayed.
fn build_context(history: &[ConversationMessage], message: &str) -> Vec<ChatMessage> {
    let conversational: Vec<&ConversationMessage> = history
        .iter()
        .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
        .collect();
    let tail = &conversational[conversational.len().saturating_sub(MAX_CONTEXT_MESSAGES)..];

    let mut messages = Vec::with_capacity(tail.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    for entry in tail {
        messages.push(match entry.role {
            MessageRole::Assistant => ChatMessage::assistant(entry.content.clone()),
            _ => ChatMessage::user(entry.content.clone()),
        });
    }
    messages.push(ChatMessage::user(message));
    messages
}

async fn run_tool_loop(
    state: &AppState,
    user_id: &str,
    mut messages: Vec<ChatMessage>,
    now: DateTime<Utc>,
) -> Result<LoopOutcome, LLMError> {
    let model = state.model();
    let tools = definitions();
    let mut outcome = LoopOutcome::default();
    let mut rounds = 0;

    loop {
        let reply = model.complete(&messages, &tools).await?;
        if reply.tool_calls.is_empty() || rounds == MAX_TOOL_ROUNDS {
            if !reply.tool_calls.is_empty() {
                tracing::warn!(user_id, rounds, "tool round limit reached");
            }
            outcome.text = reply.content.unwrap_or_else(|| UNFINISHED_REPLY.to_string());
            return Ok(outcome);
        }
        rounds += 1;

        messages.push(ChatMessage::assistant_tool_calls(
            reply.content.clone(),
            reply.tool_calls.clone(),
        ));
        for request in reply.tool_calls {
            let name = request.function.name.as_str();
            let result = match ToolCall::parse(name, &request.function.arguments) {
                Ok(call) => {
                    outcome.record(call.name());
                    match call.execute(state, user_id, now).await {
                        Ok(output) => {
                            let json = output.to_json();
                            outcome.outputs.push(output);
                            json
                        }
                        Err(err) => {
                            tracing::info!(user_id, tool = name, error = %err, "tool returned an error");
                            json!({ "error": err.to_string() })
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(user_id, tool = name, error = %err, "rejected tool call");
                    json!({ "error": err.to_string() })
                }
            };
            messages.push(ChatMessage::tool_result(request.id, result.to_string()));
        }
    }
}

fn stored(
    session_id: &str,
    role: MessageRole,
    content: impl Into<String>,
    tools_used: Vec<String>,
    now: DateTime<Utc>,
) -> ConversationMessage {
    ConversationMessage {
        session_id: session_id.to_string(),
        role,
        content: content.into(),
        tools_used,
        timestamp: now,
    }
}

/// Greeting for a new session, built from the profile alone.
fn welcome_message(view: &ProfileView, has_test: bool) -> String {
    let profile = &view.profile;
    let name = profile
        .name
        .as_deref()
        .and_then(|name| name.split_whitespace().next())
        .unwrap_or("there");
    let test_type = profile.test_type.as_deref().unwrap_or("test");

    if let (true, Some(score)) = (has_test, view.current_score) {
        let improved = profile.baseline_score.is_some_and(|baseline| score > baseline);
        let verdict = if improved {
            "which is a marked improvement but I think there's still room to grow."
        } else {
            "and I think there's still plenty of room to grow."
        };
        return format!(
            "Hey {name}!\nWell done on that last exam!\nYou scored a {score} {verdict}\nYou got this! 😉"
        );
    }

    match view.days_until_test {
        Some(days) if days <= 0 => format!(
            "Hey {name}!\n\nYay! It's test day! 🎉\n\nAre you excited? I hope you're feeling confident and ready to show what you know! 💪"
        ),
        Some(days) if days <= 7 => format!(
            "Hey {name}! 👋\n\nYour {test_type} is coming up soon!\n\nOnly {days} days to go! Let's make sure you're fully prepared."
        ),
        Some(days) if days <= 30 => format!(
            "Hey {name}! 👋\n\nGreat to see you preparing for your {test_type}!\n\nYou have {days} days to prepare. We've got this! 🎯"
        ),
        Some(_) => format!("Hey {name}! 👋\n\nWelcome back to your {test_type} prep!"),
        None => format!("Hey {name}! 👋\n\nReady to ace your {test_type}?"),
    }
}

/// Opens a session with a greeting drawn from the learner's profile and
/// progress. The model is not consulted.
async fn welcome_turn(
    state: &AppState,
    user_id: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<ChatTurn, ServiceError> {
    let snapshot = state.store().snapshot(user_id).await?;
    let view = ProfileView::from_snapshot(&snapshot, now);
    let summary = progress::summarize(state, &snapshot, now);
    let response = welcome_message(&view, !snapshot.test_results.is_empty());
    let tools_used: Vec<String> = WELCOME_TOOLS.iter().map(|t| t.to_string()).collect();

    let session_id = Uuid::new_v4().to_string();
    state
        .store()
        .append_messages(
            user_id,
            vec![
                stored(&session_id, MessageRole::User, message, Vec::new(), now),
                stored(&session_id, MessageRole::Assistant, response.clone(), tools_used.clone(), now),
            ],
        )
        .await?;

    tracing::info!(user_id, %session_id, "session started");

    Ok(ChatTurn {
        ui_elements: UiElements::welcome(&view, &summary),
        session_id,
        response,
        follow_ups: vec![WELCOME_FOLLOW_UP],
        tools_used,
        metadata: ChatMetadata {
            timestamp: now,
            tool_calls_made: WELCOME_TOOLS.len(),
            error: None,
            is_welcome: Some(true),
        },
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageCounts {
    pub user: usize,
    pub assistant: usize,
    pub system: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// Number of user messages
    pub total_turns: usize,
    pub message_counts: MessageCounts,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// An unknown session summarizes as empty; another user's is not found.
pub async fn get_session_summary(
    state: &AppState,
    user_id: &str,
    session_id: &str,
) -> Result<SessionSummary, ServiceError> {
    state.store().get_profile(user_id).await?;
    let messages = state.store().session_messages(user_id, session_id).await?;

    let mut counts = MessageCounts::default();
    for message in &messages {
        match message.role {
            MessageRole::User => counts.user += 1,
            MessageRole::Assistant => counts.assistant += 1,
            MessageRole::System => counts.system += 1,
        }
    }
    Ok(SessionSummary {
        session_id: session_id.to_string(),
        total_turns: counts.user,
        message_counts: counts,
        started_at: messages.first().map(|m| m.timestamp),
        last_activity: messages.last().map(|m| m.timestamp),
    })
}

pub async fn handle_message(
    state: &AppState,
    request: ChatRequest,
    now: DateTime<Utc>,
) -> Result<ChatTurn, ServiceError> {
    let user_id = request.user_id.trim();
    let message = request.message.trim();
    if user_id.is_empty() {
        return Err(ServiceError::Validation("user_id is required".to_string()));
    }
    if message.is_empty() {
        return Err(ServiceError::Validation("message must not be empty".to_string()));
    }

    state.store().get_profile(user_id).await?;

    let Some(session_id) = request
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        return welcome_turn(state, user_id, message, now).await;
    };
    let history = state.store().session_messages(user_id, &session_id).await?;
    let context = build_context(&history, message);

    let user_entry = stored(&session_id, MessageRole::User, message, Vec::new(), now);

    match run_tool_loop(state, user_id, context, now).await {
        Ok(outcome) => {
            state
                .store()
                .append_messages(
                    user_id,
                    vec![
                        user_entry,
                        stored(
                            &session_id,
                            MessageRole::Assistant,
                            outcome.text.clone(),
                            outcome.tools_used.clone(),
                            now,
                        ),
                    ],
                )
                .await?;

            tracing::info!(
                user_id,
                %session_id,
                tools = ?outcome.tools_used,
                tool_calls = outcome.calls_made,
                "chat turn completed"
            );

            let used: Vec<&str> = outcome.tools_used.iter().map(String::as_str).collect();
            Ok(ChatTurn {
                ui_elements: UiElements::from_outputs(&outcome.outputs, &used),
                follow_ups: follow_ups(&outcome.tools_used),
                session_id,
                response: outcome.text,
                tools_used: outcome.tools_used,
                metadata: ChatMetadata {
                    timestamp: now,
                    tool_calls_made: outcome.calls_made,
                    error: None,
                    is_welcome: None,
                },
            })
        }
        Err(err) => {
            tracing::error!(user_id, %session_id, error = %err, "chat model failed");
            state
                .store()
                .append_messages(
                    user_id,
                    vec![
                        user_entry,
                        stored(
                            &session_id,
                            MessageRole::System,
                            format!("model error: {err}"),
                            Vec::new(),
                            now,
                        ),
                    ],
                )
                .await?;

            Ok(ChatTurn {
                session_id,
                response: APOLOGY.to_string(),
                follow_ups: Vec::new(),
                tools_used: Vec::new(),
                ui_elements: UiElements::from_outputs(&[], &[]),
                metadata: ChatMetadata {
                    timestamp: now,
                    tool_calls_made: 0,
                    error: Some(true),
                    is_welcome: None,
                },
            })
        }
    }
}
