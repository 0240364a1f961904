//! # prepcoach-algo - study decision logic
//!
//! Pure Rust implementation of the decisions behind an adaptive test-prep
//! coach. Nothing in this crate performs I/O; every function takes the
//! attempt history and question bank it needs and returns a derived value.
//!
//! ## Module structure
//!
//! - [`types`] - questions, the question bank, attempt records, accuracy
//! - [`performance`] - per-topic and overall accuracy, recent-window trend
//! - [`quiz`] - adaptive quiz selection (weak-topic bias, recency
//!   exclusion, difficulty mix)
//! - [`streak`] - day-level streaks in the learner's local calendar
//! - [`milestones`] - idempotent milestone detection
//! - [`recommend`] - prioritized study recommendations
//! - [`patterns`] - error pattern analysis
//!
//! ## Example
//!
//! ```rust
//! use prepcoach_algo::{generate_quiz, quiz_rng, QuestionBank, QuizConfig, QuizRequest};
//!
//! let bank = QuestionBank::new(vec![]).unwrap();
//! let mut rng = quiz_rng(Some(7));
//! let quiz = generate_quiz(&bank, &[], &QuizRequest::new(10), &QuizConfig::default(), &mut rng)
//!     .unwrap();
//! assert!(quiz.partial);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod types;
pub mod performance;
pub mod quiz;
pub mod streak;
pub mod milestones;
pub mod recommend;
pub mod patterns;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use performance::{
    aggregate, classify_trend, filter_attempts, AggregatorConfig, PerformanceReport,
    SubtopicPerformance, Timeframe, TopicPerformance, Trend,
};

pub use quiz::{
    generate_quiz, quiz_rng, DifficultyDistribution, QuizConfig, QuizError, QuizRequest,
    QuizSelection, RecencyWindow,
};

pub use streak::{streak_report, utc_offset, StreakReport, StreakRun};

pub use milestones::{evaluate_milestones, Milestone, MilestoneKind, MilestoneReport};

pub use recommend::{recommend, Priority, Recommendation, RecommendationKind};

pub use patterns::{error_patterns, ErrorPatterns};
