//! Property-Based Tests for tool-call parsing and profile updates
//!
//! Tests the following invariants:
//! - Parsing arbitrary model arguments never panics
//! - Quiz size and history window bounds are enforced before execution
//! - A model-supplied user id never changes which tool is selected
//! - Profile updates are validated as a whole before anything is applied

use proptest::prelude::*;

use prepcoach_algo::quiz::MAX_QUIZ_SIZE;
use prepcoach_backend::services::profile::{apply_update, ProfileUpdate};
use prepcoach_backend::services::progress::MAX_HISTORY_DAYS;
use prepcoach_backend::store::UserProfile;
use prepcoach_backend::tools::{ToolCall, ToolError, TOOL_NAMES};

fn arb_tool_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(TOOL_NAMES.to_vec())
}

proptest! {
    #[test]
    fn prop_parse_never_panics(name in arb_tool_name(), args in ".{0,64}") {
        let _ = ToolCall::parse(name, &args);
    }

    #[test]
    fn prop_quiz_size_bounds(size in 0usize..200) {
        let result = ToolCall::parse("generate_adaptive_quiz", &format!(r#"{{"size": {size}}}"#));
        prop_assert_eq!(result.is_ok(), (1..=MAX_QUIZ_SIZE).contains(&size));
    }

    #[test]
    fn prop_history_window_bounds(days in 0u32..1000) {
        let result = ToolCall::parse("get_learning_history", &format!(r#"{{"days": {days}}}"#));
        match result {
            Ok(call) => prop_assert!((1..=MAX_HISTORY_DAYS).contains(&days) && call.name() == "get_learning_history"),
            Err(err) => {
                prop_assert!(days == 0 || days > MAX_HISTORY_DAYS);
                let is_invalid = matches!(err, ToolError::InvalidArguments { .. });
                prop_assert!(is_invalid);
            }
        }
    }

    #[test]
    fn prop_user_id_argument_is_ignored(name in arb_tool_name(), user_id in "[a-z0-9-]{1,20}") {
        prop_assume!(name != "get_question_explanation");
        let call = ToolCall::parse(name, &format!(r#"{{"user_id": "{user_id}"}}"#));
        prop_assert!(call.is_ok());
        prop_assert_eq!(call.unwrap().name(), name);
    }

    #[test]
    fn prop_invalid_update_leaves_profile_untouched(
        target in 1u32..3000,
        offset in -2000i32..2000,
    ) {
        let mut profile = UserProfile::new("u1");
        let before = profile.clone();
        let update = ProfileUpdate {
            target_score: Some(target),
            utc_offset_minutes: Some(offset),
            ..Default::default()
        };

        match apply_update(&mut profile, update) {
            Ok(fields) => {
                prop_assert!(offset.abs() <= 840);
                prop_assert_eq!(profile.target_score, Some(target));
                prop_assert_eq!(profile.utc_offset_minutes, offset);
                prop_assert_eq!(fields.len(), 2);
            }
            Err(_) => {
                prop_assert!(offset.abs() > 840);
                prop_assert_eq!(profile, before);
            }
        }
    }
}
