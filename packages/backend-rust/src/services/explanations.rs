use prepcoach_algo::{Difficulty, Question};
use serde::Serialize;

use super::ServiceError;
use crate::state::AppState;

const GENERAL_TIPS: [&str; 4] = [
    "Practice regularly to build familiarity",
    "Review incorrect answers carefully",
    "Time yourself to improve speed",
    "Identify patterns in question types",
];

#[derive(Debug, Clone, Serialize)]
pub struct QuestionExplanation {
    pub question_id: String,
    pub topic: String,
    pub subtopic: String,
    pub difficulty: Difficulty,
    pub correct_answer: String,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_tips: Option<Vec<&'static str>>,
}

pub fn learning_tips(topic: &str) -> Vec<&'static str> {
    let tips: &[&'static str] = match topic.to_ascii_lowercase().as_str() {
        "algebra" => &[
            "Master FOIL and factoring techniques",
            "Draw diagrams for word problems",
            "Check your work by substituting answers back",
        ],
        "geometry" => &[
            "Memorize key formulas for area and volume",
            "Draw and label diagrams",
            "Look for similar triangles and parallel lines",
        ],
        "reading_comprehension" => &[
            "Read the questions before the passage",
            "Underline key phrases",
            "Eliminate obviously wrong answers first",
        ],
        "vocabulary" => &[
            "Learn word roots and prefixes",
            "Use flashcards for daily practice",
            "Read widely to see words in context",
        ],
        "probability" => &[
            "Draw tree diagrams for complex problems",
            "Remember: P(A and B) = P(A) × P(B) for independent events",
            "Count carefully and check your work",
        ],
        _ => &GENERAL_TIPS,
    };
    tips.to_vec()
}

pub fn explain(question: &Question, detailed: bool) -> QuestionExplanation {
    QuestionExplanation {
        question_id: question.question_id.clone(),
        topic: question.topic.clone(),
        subtopic: question.subtopic.clone(),
        difficulty: question.difficulty,
        correct_answer: question.correct_answer.clone(),
        explanation: question.explanation.clone(),
        learning_tips: detailed.then(|| learning_tips(&question.topic)),
    }
}

pub fn question_explanation(
    state: &AppState,
    question_id: &str,
    detailed: bool,
) -> Result<QuestionExplanation, ServiceError> {
    state
        .bank()
        .get(question_id)
        .map(|q| explain(q, detailed))
        .ok_or_else(|| ServiceError::NotFound(format!("question {question_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question_bank::builtin_bank;

    #[test]
    fn test_tips_fall_back_to_general() {
        assert_eq!(learning_tips("Algebra")[0], "Master FOIL and factoring techniques");
        assert_eq!(learning_tips("grammar"), GENERAL_TIPS.to_vec());
    }

    #[test]
    fn test_tips_only_when_detailed() {
        let bank = builtin_bank().unwrap();
        let question = bank.get("geo-003").unwrap();
        assert!(explain(question, false).learning_tips.is_none());
        let detailed = explain(question, true);
        assert_eq!(detailed.correct_answer, "A");
        assert_eq!(detailed.learning_tips.unwrap().len(), 3);
    }
}
