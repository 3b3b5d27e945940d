//! OPRO loop use case.
//!
//! `OproUseCase` orchestrates the optimization loop over the domain
//! model: generate candidates for the current step, score them, advance
//! to the next step. Every operation is a full read-modify-write against
//! the session repository (fetch the freshest session, mutate in memory,
//! write it back).
//!
//! That read-modify-write is not transactionally isolated: if two paths
//! mutate the same session concurrently, the later write wins.
//! Completions narrow the race window by re-fetching the freshest
//! session immediately before applying their update, and completions
//! tagged with a session that is no longer active are discarded on
//! arrival (logical cancellation; the in-flight network call is not
//! aborted).

use futures::future::join_all;
use opro_core::benchmark::Benchmark;
use opro_core::error::{OproError, Result};
use opro_core::meta_prompt::{MetaPromptSynthesizer, Sampler};
use opro_core::session::{OproConfig, Prompt, PromptState, Session, SessionRepository};
use opro_engine::{ModelClient, Proposer, RetryPolicy, ScoreOutcome, Scorer};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Settled outcome of one batch member.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The prompt was scored with the given accuracy
    Scored(f64),
    /// The completion arrived after a session switch and was discarded
    Discarded,
    /// Scoring failed; the prompt was reverted to pending
    Failed(OproError),
}

/// Per-prompt report from a score-batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub prompt_id: String,
    pub outcome: BatchOutcome,
}

pub struct OproUseCase {
    /// Repository for session data persistence
    session_repository: Arc<dyn SessionRepository>,
    /// Builds the search prompt sent to the proposer model
    synthesizer: MetaPromptSynthesizer,
    /// Requests new candidates from the proposer model
    proposer: Proposer,
    /// Evaluates candidates against the benchmark
    scorer: Scorer,
    /// Read-only benchmark shared by all scoring calls
    benchmark: Benchmark,
    /// The session the operator is currently working in
    active_session_id: Arc<RwLock<Option<String>>>,
}

impl OproUseCase {
    pub fn new(
        session_repository: Arc<dyn SessionRepository>,
        client: Arc<dyn ModelClient>,
        benchmark: Benchmark,
    ) -> Self {
        Self {
            session_repository,
            synthesizer: MetaPromptSynthesizer::default(),
            proposer: Proposer::new(client.clone()),
            scorer: Scorer::new(client),
            benchmark,
            active_session_id: Arc::new(RwLock::new(None)),
        }
    }

    /// Replaces the exemplar sampler (tests supply a deterministic one).
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.synthesizer = MetaPromptSynthesizer::new(sampler);
        self
    }

    /// Applies one retry policy to both the proposer and the grader.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.proposer = self.proposer.with_retry(retry);
        self.scorer = self.scorer.with_retry(retry);
        self
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Creates a session with an empty step 0 and marks it active.
    ///
    /// # Errors
    ///
    /// Returns `OproError::Config` if the configuration fails validation.
    pub async fn create_session(&self, name: impl Into<String>, config: OproConfig) -> Result<Session> {
        config.validate()?;
        let session = Session::new(name, config);
        self.session_repository.save(&session).await?;
        *self.active_session_id.write().await = Some(session.id.clone());
        tracing::info!(session_id = %session.id, "created session");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.require_session(session_id).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.session_repository.list_all().await
    }

    /// Deletes a session and all its steps and prompts.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.session_repository.delete(session_id).await?;
        let mut active = self.active_session_id.write().await;
        if active.as_deref() == Some(session_id) {
            *active = None;
        }
        Ok(())
    }

    /// Makes another session the active one. In-flight completions tagged
    /// with the previously active session are discarded on arrival.
    ///
    /// Reattaching also revives the session: prompts a discarded
    /// completion left at scoring are reverted to pending so the step can
    /// still be finished with fresh scoring passes.
    pub async fn switch_session(&self, session_id: &str) -> Result<Session> {
        let mut session = self.require_session(session_id).await?;
        *self.active_session_id.write().await = Some(session.id.clone());
        let reclaimed = session.reclaim_scoring_prompts();
        if reclaimed > 0 {
            self.session_repository.save(&session).await?;
            tracing::info!(session_id, reclaimed, "reverted orphaned scoring prompts");
        }
        tracing::info!(session_id, "switched active session");
        Ok(session)
    }

    pub async fn active_session_id(&self) -> Option<String> {
        self.active_session_id.read().await.clone()
    }

    // ------------------------------------------------------------------
    // Optimization loop
    // ------------------------------------------------------------------

    /// Generates candidates for the current step.
    ///
    /// Allowed only while the step has zero prompts (one generation per
    /// step). On proposer failure the step stays empty and the call is
    /// retryable.
    pub async fn generate(&self, session_id: &str) -> Result<Vec<Prompt>> {
        let session = self.require_session(session_id).await?;
        if !session.current_step().is_empty() {
            return Err(OproError::invalid_state(format!(
                "step {} already has prompts; generation runs once per step",
                session.current_step
            )));
        }

        let meta_prompt = self.synthesizer.synthesize(&session, &self.benchmark);
        let config = session.config.clone();
        let candidates = self
            .proposer
            .propose(
                &meta_prompt,
                config.k,
                config.optimizer_temperature,
                &config.optimizer_model,
            )
            .await?;

        if self.active_session_id().await.as_deref() != Some(session_id) {
            tracing::debug!(session_id, "discarding generation for inactive session");
            return Err(OproError::invalid_state(
                "session is no longer active; generated candidates discarded",
            ));
        }

        // re-fetch the freshest state before applying; add_candidates
        // re-checks the empty-step precondition
        let mut session = self.require_session(session_id).await?;
        let prompts = session.add_candidates(candidates)?;
        self.session_repository.save(&session).await?;
        tracing::info!(session_id, count = prompts.len(), "appended candidates");
        Ok(prompts)
    }

    /// Scores one pending prompt against the benchmark.
    ///
    /// Returns `Ok(Some(accuracy))` once the score has been applied, or
    /// `Ok(None)` when the completion arrived after a session switch and
    /// was discarded.
    pub async fn score_one(&self, session_id: &str, prompt_id: &str) -> Result<Option<f64>> {
        let mut session = self.require_session(session_id).await?;
        let config = session.config.clone();
        let text = {
            let prompt = session
                .find_prompt_mut(prompt_id)
                .ok_or_else(|| OproError::not_found("prompt", prompt_id))?;
            prompt.begin_scoring()?;
            prompt.text.clone()
        };
        session.touch();
        self.session_repository.save(&session).await?;

        let outcome = self
            .scorer
            .score(
                &text,
                &self.benchmark,
                config.scorer_temperature,
                &config.scorer_model,
            )
            .await;

        if self.active_session_id().await.as_deref() != Some(session_id) {
            tracing::debug!(session_id, prompt_id, "discarding completion for inactive session");
            return Ok(None);
        }

        // re-fetch the freshest state before applying the outcome
        let mut session = self.require_session(session_id).await?;
        let prompt = session
            .find_prompt_mut(prompt_id)
            .ok_or_else(|| OproError::not_found("prompt", prompt_id))?;

        match outcome {
            Ok(score) => {
                prompt.complete_scoring(score.accuracy)?;
                let applied = prompt.score;
                session.touch();
                self.session_repository.save(&session).await?;
                Ok(applied)
            }
            Err(err) => {
                prompt.fail_scoring()?;
                session.touch();
                self.session_repository.save(&session).await?;
                Err(err)
            }
        }
    }

    /// Scores up to `batch_size` pending prompts of the current step
    /// concurrently. Batch membership is fixed at launch: prompts added
    /// after the batch starts are not included. Waits for every member
    /// to settle.
    pub async fn score_batch(&self, session_id: &str, batch_size: usize) -> Result<Vec<ScoreReport>> {
        let session = self.require_session(session_id).await?;
        let prompt_ids: Vec<String> = session
            .current_step()
            .prompts
            .iter()
            .filter(|p| p.state == PromptState::Pending)
            .take(batch_size)
            .map(|p| p.id.clone())
            .collect();

        let reports = join_all(prompt_ids.into_iter().map(|prompt_id| async move {
            let outcome = match self.score_one(session_id, &prompt_id).await {
                Ok(Some(score)) => BatchOutcome::Scored(score),
                Ok(None) => BatchOutcome::Discarded,
                Err(err) => BatchOutcome::Failed(err),
            };
            ScoreReport { prompt_id, outcome }
        }))
        .await;

        Ok(reports)
    }

    /// Opens the next step. Requires the current step to be non-empty and
    /// fully scored; nothing is persisted on failure.
    pub async fn advance(&self, session_id: &str) -> Result<u32> {
        let mut session = self.require_session(session_id).await?;
        session.advance()?;
        self.session_repository.save(&session).await?;
        tracing::info!(session_id, step = session.current_step, "advanced to next step");
        Ok(session.current_step)
    }

    /// Scores an ad-hoc candidate text with the session's scorer config
    /// without creating a prompt record. Purely informational.
    pub async fn custom_score(&self, session_id: &str, text: &str) -> Result<ScoreOutcome> {
        let session = self.require_session(session_id).await?;
        self.scorer
            .score(
                text,
                &self.benchmark,
                session.config.scorer_temperature,
                &session.config.scorer_model,
            )
            .await
    }

    async fn require_session(&self, session_id: &str) -> Result<Session> {
        self.session_repository
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| OproError::not_found("session", session_id))
    }
}
