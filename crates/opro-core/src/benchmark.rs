//! Benchmark question types.
//!
//! A benchmark is an ordered, read-only set of question/answer pairs loaded
//! once at startup and shared by every scoring call in the process.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An immutable question paired with its expected numeric answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// The question text presented to the grader model
    pub question: String,
    /// The expected numeric answer; graded with strict equality
    pub gold_answer: f64,
}

impl QuestionAnswer {
    pub fn new(question: impl Into<String>, gold_answer: f64) -> Self {
        Self {
            question: question.into(),
            gold_answer,
        }
    }
}

/// Shared, read-only handle to a loaded benchmark.
///
/// Cheap to clone; safe to share across concurrent scoring calls within
/// and across sessions.
pub type Benchmark = Arc<[QuestionAnswer]>;

/// Wraps a loaded question list into a shareable benchmark handle.
pub fn benchmark_from(questions: Vec<QuestionAnswer>) -> Benchmark {
    questions.into()
}
