//! Question bank loading.
//!
//! The bank is read once at startup, from `QUESTION_BANK_PATH` when set and
//! otherwise from the set compiled into the binary.

use std::path::Path;

use prepcoach_algo::{BankError, Question, QuestionBank};
use thiserror::Error;

const BUILTIN_QUESTIONS: &str = include_str!("../data/questions.json");

#[derive(Debug, Error)]
pub enum BankLoadError {
    #[error("failed to read question bank {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid question bank JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid question bank: {0}")]
    Invalid(#[from] BankError),
}

pub fn load_question_bank(path: Option<&Path>) -> Result<QuestionBank, BankLoadError> {
    let bank = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| BankLoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            parse_questions(&raw)?
        }
        None => builtin_bank()?,
    };

    tracing::info!(
        questions = bank.len(),
        topics = bank.topics().len(),
        source = path.map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".to_string()),
        "question bank loaded"
    );
    Ok(bank)
}

pub fn builtin_bank() -> Result<QuestionBank, BankLoadError> {
    parse_questions(BUILTIN_QUESTIONS)
}

fn parse_questions(raw: &str) -> Result<QuestionBank, BankLoadError> {
    let questions: Vec<Question> = serde_json::from_str(raw)?;
    Ok(QuestionBank::new(questions)?)
}
