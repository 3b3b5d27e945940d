//! Proposer client.
//!
//! Asks the proposer model for the next generation of candidate
//! instructions. One structured-output request per attempt under the
//! shared retry policy; a usable reply is a JSON object with a non-empty
//! `instructions` array of strings.

use crate::client::{ModelClient, ModelClientError};
use crate::retry::RetryPolicy;
use opro_core::error::{OproError, Result};
use opro_core::meta_prompt::{INSTRUCTION_CLOSE, INSTRUCTION_OPEN};
use std::sync::Arc;

pub struct Proposer {
    client: Arc<dyn ModelClient>,
    retry: RetryPolicy,
}

impl Proposer {
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

    /// Requests `k` candidate instructions for the given meta-prompt.
    ///
    /// Returns at most `k` cleaned candidates. A well-behaved proposer
    /// returns exactly `k`; the client truncates defensively and strips
    /// the instruction delimiters the model may have echoed back.
    ///
    /// # Errors
    ///
    /// Returns `OproError::Generation` carrying the last underlying error
    /// once the attempt budget is exhausted. The caller must not add any
    /// prompts to the step in that case.
    pub async fn propose(
        &self,
        meta_prompt: &str,
        k: u8,
        temperature: f32,
        model: &str,
    ) -> Result<Vec<String>> {
        let candidates = self
            .retry
            .run(
                || self.request_candidates(meta_prompt, model, temperature),
                ModelClientError::is_retryable,
            )
            .await
            .map_err(|err| {
                tracing::warn!(model, "proposal exhausted retries: {err}");
                OproError::generation(err.to_string())
            })?;

        Ok(candidates
            .into_iter()
            .take(k as usize)
            .map(|text| clean_candidate(&text))
            .filter(|text| !text.is_empty())
            .collect())
    }

    async fn request_candidates(
        &self,
        meta_prompt: &str,
        model: &str,
        temperature: f32,
    ) -> std::result::Result<Vec<String>, ModelClientError> {
        let reply = self
            .client
            .complete_json(meta_prompt, model, temperature)
            .await?;

        let instructions = reply
            .get("instructions")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ModelClientError::MalformedResponse(
                    "reply is missing the 'instructions' array".to_string(),
                )
            })?;

        let texts: Vec<String> = instructions
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect();

        if texts.is_empty() {
            return Err(ModelClientError::MalformedResponse(
                "'instructions' array contains no strings".to_string(),
            ));
        }

        Ok(texts)
    }
}

/// Strips echoed instruction delimiters and surrounding whitespace.
fn clean_candidate(text: &str) -> String {
    text.replace(INSTRUCTION_OPEN, "")
        .replace(INSTRUCTION_CLOSE, "")
        .trim()
        .to_string()
}
