//! Scoring detected answers against an answer key

pub mod registry;

pub use registry::AnswerKeyRegistry;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Question id → answer, in declaration order
pub type AnswerKey = serde_json::Map<String, Value>;

/// Per-question comparison entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionComparison {
    pub question: String,
    #[schema(value_type = Object)]
    pub detected: Value,
    #[schema(value_type = Object)]
    pub correct: Value,
    pub is_correct: bool,
}

/// Score summary for one sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GradeReport {
    pub score: usize,
    pub total: usize,
    pub percentage: f64,
    pub grade: String,
    pub comparison: Vec<QuestionComparison>,
}

/// Compare detected answers with the key, question by question in key order.
///
/// A question missing from `detected` compares as `null`, so it only counts
/// as correct when the key itself expects `null`.
pub fn grade_answers(detected: &AnswerKey, key: &AnswerKey) -> GradeReport {
    let comparison: Vec<QuestionComparison> = key
        .iter()
        .map(|(question, correct)| {
            let detected = detected.get(question).cloned().unwrap_or(Value::Null);
            let is_correct = &detected == correct;
            QuestionComparison {
                question: question.clone(),
                detected,
                correct: correct.clone(),
                is_correct,
            }
        })
        .collect();

    let score = comparison.iter().filter(|c| c.is_correct).count();
    let total = comparison.len();
    let raw = if total > 0 {
        score as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    GradeReport {
        score,
        total,
        percentage: round2(raw),
        grade: letter_grade(raw).to_string(),
        comparison,
    }
}

/// Letter grade for a percentage score
pub fn letter_grade(percentage: f64) -> &'static str {
    match percentage {
        p if p >= 90.0 => "A+",
        p if p >= 80.0 => "A",
        p if p >= 70.0 => "B",
        p if p >= 60.0 => "C",
        p if p >= 50.0 => "D",
        _ => "F",
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
