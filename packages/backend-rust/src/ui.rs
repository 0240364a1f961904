//! Display hints attached to chat responses.
//!
//! Cards and charts are derived only from tool results of the current turn;
//! quick replies depend on which tools ran.

use serde::Serialize;

use crate::services::performance::{section_label, BarChart, TopicAnalysis, TopicView};
use crate::services::profile::ProfileView;
use crate::services::progress::{ProgressSummary, StreakView};
use crate::services::recommendations::StudyRecommendations;
use crate::tools::ToolOutput;

const ACCURACY_TARGET: u32 = 85;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Card {
    ProfileOverview {
        data: ProfileOverview,
    },
    WelcomeProgress {
        data: WelcomeProgress,
    },
    ProgressCard {
        title: &'static str,
        data: ProgressSummary,
    },
    QuizReady {
        title: &'static str,
        message: String,
        action: &'static str,
        quiz_id: String,
        total_questions: usize,
    },
    Performance {
        title: String,
        data: TopicAnalysis,
    },
    Streak {
        title: &'static str,
        data: StreakView,
    },
    Recommendations {
        title: &'static str,
        data: StudyRecommendations,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileOverview {
    pub test_type: Option<String>,
    pub target_score: Option<u32>,
    pub baseline_score: Option<u32>,
    pub current_score: Option<u32>,
    /// Only while the test is still ahead
    pub days_until_test: Option<i64>,
    pub study_hours_per_week: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WelcomeProgress {
    pub overall_accuracy: Option<f64>,
    pub total_questions: u32,
    pub weak_areas: Vec<TopicView>,
    pub strong_areas: Vec<TopicView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chart {
    CircularProgress {
        title: &'static str,
        value: Option<f64>,
        target: u32,
        label: String,
    },
    BarChart {
        title: &'static str,
        data: BarChart,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickReply {
    pub text: &'static str,
    pub action: &'static str,
}

const fn reply(text: &'static str, action: &'static str) -> QuickReply {
    QuickReply { text, action }
}

const TEST_RESULT_REPLIES: [QuickReply; 4] = [
    reply("📊 Analyze my last exam", "analyze_exam"),
    reply("💰 How can I improve my scores?", "improve_scores"),
    reply("📈 Compare with my target", "compare_progress"),
    reply("🎯 Generate practice questions", "create_quiz"),
];

const TOPIC_ANALYSIS_REPLIES: [QuickReply; 4] = [
    reply("🎯 Create practice on weak areas", "create_quiz"),
    reply("📊 Show detailed breakdown", "detailed_analysis"),
    reply("💡 What should I study next?", "get_recommendations"),
    reply("📈 How am I doing overall?", "check_progress"),
];

const QUIZ_REPLIES: [QuickReply; 4] = [
    reply("▶️ Start this quiz", "start_quiz"),
    reply("⚙️ Customize quiz settings", "customize_quiz"),
    reply("📚 Review concepts first", "review_concepts"),
    reply("❌ Skip for now", "cancel"),
];

const PLAN_REPLIES: [QuickReply; 4] = [
    reply("🎯 Create practice quiz", "create_quiz"),
    reply("📊 Analyze more details", "analyze_exam"),
    reply("💡 Show study plan", "get_recommendations"),
    reply("📈 Track my progress", "check_progress"),
];

const PROGRESS_REPLIES: [QuickReply; 4] = [
    reply("🎯 Create practice questions", "create_quiz"),
    reply("📊 Analyze my last test", "analyze_exam"),
    reply("💡 Get recommendations", "get_recommendations"),
    reply("🔥 Check my streak", "check_progress"),
];

const ERROR_PATTERN_REPLIES: [QuickReply; 4] = [
    reply("🎯 Practice my weak topics", "create_quiz"),
    reply("📊 Show detailed analysis", "detailed_analysis"),
    reply("💡 How to fix these mistakes?", "get_recommendations"),
    reply("📚 Review explanations", "review_concepts"),
];

const EXPLANATION_REPLIES: [QuickReply; 4] = [
    reply("🎯 Try similar questions", "create_quiz"),
    reply("📊 Analyze my test", "analyze_exam"),
    reply("💡 Explain another topic", "explain_concepts"),
    reply("📈 Check my progress", "check_progress"),
];

const DEFAULT_REPLIES: [QuickReply; 4] = [
    reply("📊 Analyze my last exam", "analyze_exam"),
    reply("💰 How can I improve my scores?", "improve_scores"),
    reply("🤔 How am I doing now?", "check_progress"),
    reply("📝 Come up with similar questions", "create_quiz"),
];

/// First matching tool wins; the order is most to least specific.
pub fn quick_replies(tools_used: &[&str]) -> Vec<QuickReply> {
    let used = |name: &str| tools_used.contains(&name);
    let replies: &[QuickReply] = if used("get_latest_test_results") {
        &TEST_RESULT_REPLIES
    } else if used("analyze_performance_by_topic") {
        &TOPIC_ANALYSIS_REPLIES
    } else if used("generate_adaptive_quiz") {
        &QUIZ_REPLIES
    } else if used("generate_bar_chart_data") || used("generate_study_recommendations") {
        &PLAN_REPLIES
    } else if used("get_progress_summary") {
        &PROGRESS_REPLIES
    } else if used("identify_error_patterns") {
        &ERROR_PATTERN_REPLIES
    } else if used("get_question_explanation") {
        &EXPLANATION_REPLIES
    } else {
        &DEFAULT_REPLIES
    };
    replies.to_vec()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UiElements {
    pub cards: Vec<Card>,
    pub charts: Vec<Chart>,
    pub quick_replies: Vec<QuickReply>,
}

impl UiElements {
    /// Profile overview and, once questions were answered, overall accuracy.
    pub fn welcome(profile: &ProfileView, progress: &ProgressSummary) -> Self {
        let mut ui = UiElements {
            quick_replies: DEFAULT_REPLIES.to_vec(),
            ..Default::default()
        };
        ui.cards.push(Card::ProfileOverview {
            data: ProfileOverview {
                test_type: profile.profile.test_type.clone(),
                target_score: profile.profile.target_score,
                baseline_score: profile.profile.baseline_score,
                current_score: profile.current_score,
                days_until_test: profile.days_until_test.filter(|days| *days > 0),
                study_hours_per_week: profile.profile.study_hours_per_week,
            },
        });

        if progress.total_questions_attempted > 0 {
            ui.charts.push(Chart::CircularProgress {
                title: "Overall Accuracy",
                value: progress.overall_accuracy,
                target: ACCURACY_TARGET,
                label: format!("{} questions attempted", progress.total_questions_attempted),
            });
            if !progress.weak_areas.is_empty() || !progress.strong_areas.is_empty() {
                ui.cards.push(Card::WelcomeProgress {
                    data: WelcomeProgress {
                        overall_accuracy: progress.overall_accuracy,
                        total_questions: progress.total_questions_attempted,
                        weak_areas: progress.weak_areas.clone(),
                        strong_areas: progress.strong_areas.clone(),
                    },
                });
            }
        }
        ui
    }

    pub fn from_outputs(outputs: &[ToolOutput], tools_used: &[&str]) -> Self {
        let mut ui = UiElements {
            quick_replies: quick_replies(tools_used),
            ..Default::default()
        };

        for output in outputs {
            match output {
                ToolOutput::Progress(summary) => {
                    ui.charts.push(Chart::CircularProgress {
                        title: "Overall Progress",
                        value: summary.overall_accuracy,
                        target: ACCURACY_TARGET,
                        label: format!("{} questions", summary.total_questions_attempted),
                    });
                    ui.cards.push(Card::ProgressCard {
                        title: "Your Progress",
                        data: summary.clone(),
                    });
                }
                ToolOutput::Quiz(quiz) => ui.cards.push(Card::QuizReady {
                    title: "Quiz Ready!",
                    message: format!(
                        "Your personalized quiz with {} questions is ready to start.",
                        quiz.total_questions
                    ),
                    action: "start_quiz",
                    quiz_id: quiz.quiz_id.clone(),
                    total_questions: quiz.total_questions,
                }),
                ToolOutput::BarChart(chart) if !chart.bars.is_empty() => {
                    ui.charts.push(Chart::BarChart {
                        title: "Score Breakdown by Subject",
                        data: chart.clone(),
                    })
                }
                ToolOutput::TopicAnalysis(analysis) if !analysis.performance.topics.is_empty() => {
                    let title = match analysis.section.as_deref() {
                        Some(section) => format!("{} Analysis", section_label(section)),
                        None => "Topic Analysis".to_string(),
                    };
                    ui.cards.push(Card::Performance {
                        title,
                        data: analysis.clone(),
                    });
                }
                ToolOutput::Streak(streak) => ui.cards.push(Card::Streak {
                    title: "Study Streak",
                    data: streak.clone(),
                }),
                ToolOutput::Recommendations(recs) if !recs.recommendations.is_empty() => {
                    ui.cards.push(Card::Recommendations {
                        title: "Study Plan",
                        data: recs.clone(),
                    })
                }
                _ => {}
            }
        }
        ui
    }
}
