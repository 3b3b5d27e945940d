//! Scorer engine.
//!
//! Evaluates one candidate instruction against the whole benchmark with
//! fan-out/fan-in semantics: one grading call per question, each with its
//! own retry budget, all allowed to settle before the accuracy is
//! computed. A grading call that exhausts its retries resolves to a
//! failure sentinel counted as incorrect; it never aborts its siblings.
//!
//! Repeated scoring of the same candidate is not guaranteed to be
//! idempotent: the grader model and its temperature introduce sampling
//! noise. That is a property of the domain, not a defect.

use crate::client::{ModelClient, ModelClientError};
use crate::retry::RetryPolicy;
use futures::future::join_all;
use opro_core::benchmark::QuestionAnswer;
use opro_core::error::{OproError, Result};
use std::sync::Arc;

/// Result of scoring one candidate against the benchmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOutcome {
    /// `100 * correct / total`
    pub accuracy: f64,
    /// Questions the grader answered correctly
    pub correct: usize,
    /// Grading calls that exhausted their retries (a subset of the
    /// incorrect count; exposed so callers can tell failure rate apart
    /// from model error rate)
    pub failed: usize,
    /// Total questions graded
    pub total: usize,
}

/// Settled outcome of a single per-question grading call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GradeResult {
    Correct,
    Incorrect,
    Failed,
}

pub struct Scorer {
    client: Arc<dyn ModelClient>,
    retry: RetryPolicy,
}

impl Scorer {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scores `candidate` against every question concurrently and returns
    /// the settled accuracy.
    ///
    /// No concurrency cap is applied on the grading dimension; bounding
    /// how many candidates are scored at once is the orchestration
    /// layer's job.
    ///
    /// # Errors
    ///
    /// Returns `OproError::EmptyBenchmark` for a zero-question set (the
    /// caller is expected to reject this earlier).
    pub async fn score(
        &self,
        candidate: &str,
        questions: &[QuestionAnswer],
        temperature: f32,
        model: &str,
    ) -> Result<ScoreOutcome> {
        if questions.is_empty() {
            return Err(OproError::EmptyBenchmark);
        }

        let grades = join_all(
            questions
                .iter()
                .map(|qa| self.grade_one(candidate, qa, temperature, model)),
        )
        .await;

        let correct = grades.iter().filter(|g| **g == GradeResult::Correct).count();
        let failed = grades.iter().filter(|g| **g == GradeResult::Failed).count();
        let total = questions.len();

        Ok(ScoreOutcome {
            accuracy: 100.0 * correct as f64 / total as f64,
            correct,
            failed,
            total,
        })
    }

    /// Grades one question. Always settles: retry exhaustion folds into
    /// `GradeResult::Failed` rather than propagating.
    async fn grade_one(
        &self,
        candidate: &str,
        qa: &QuestionAnswer,
        temperature: f32,
        model: &str,
    ) -> GradeResult {
        let prompt = build_grading_prompt(candidate, &qa.question);

        let reply = self
            .retry
            .run(
                || self.client.complete_json(&prompt, model, temperature),
                ModelClientError::is_retryable,
            )
            .await;

        match reply {
            Ok(value) => match value.get("answer").and_then(|v| v.as_f64()) {
                // strict equality against the gold answer
                Some(answer) if answer == qa.gold_answer => GradeResult::Correct,
                _ => GradeResult::Incorrect,
            },
            Err(err) => {
                tracing::debug!(model, "grading call failed after retries: {err}");
                GradeResult::Failed
            }
        }
    }
}

fn build_grading_prompt(candidate: &str, question: &str) -> String {
    format!(
        "{candidate}\n\nQ: {question}\n\nReply with a JSON object of the form \
         {{\"answer\": <number>}} containing only the final numeric answer."
    )
}
