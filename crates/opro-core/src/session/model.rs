//! Session domain model.
//!
//! This module contains the core `Session`, `Step` and `Prompt` entities
//! the optimization loop operates on. It is the "pure" model, independent
//! of any specific storage format.
//!
//! A session owns an ordered list of steps; each step owns an ordered,
//! append-only list of candidate prompts. Invariants maintained by every
//! mutating method:
//!
//! - `steps[i].step_number == i`
//! - `current_step` equals the step number of the last step
//! - a prompt's state only moves `pending -> scoring -> scored`, with a
//!   `scoring -> pending` back-edge for failed scoring attempts and no
//!   edge out of `scored`

use super::config::OproConfig;
use crate::error::{OproError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a candidate prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptState {
    /// Created, awaiting a scoring attempt
    Pending,
    /// A scoring attempt is in flight
    Scoring,
    /// Scoring completed; `score` is set and final
    Scored,
}

/// A candidate instruction under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Unique prompt identifier (UUID format)
    pub id: String,
    /// The candidate instruction text; immutable once created
    pub text: String,
    /// Current lifecycle state
    pub state: PromptState,
    /// Accuracy in `[0, 100]`, set once scoring succeeds
    pub score: Option<f64>,
    /// Timestamp when the prompt was created (RFC 3339)
    pub created_at: String,
}

impl Prompt {
    /// Creates a new pending prompt with a fresh UUID.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            state: PromptState::Pending,
            score: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Marks the prompt as being scored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the prompt is `Pending`.
    pub fn begin_scoring(&mut self) -> Result<()> {
        match self.state {
            PromptState::Pending => {
                self.state = PromptState::Scoring;
                Ok(())
            }
            other => Err(OproError::invalid_state(format!(
                "prompt '{}' cannot start scoring from state {:?}",
                self.id, other
            ))),
        }
    }

    /// Records a successful scoring outcome, rounding to two decimals.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the prompt is `Scoring`, or if the
    /// score falls outside `[0, 100]`.
    pub fn complete_scoring(&mut self, score: f64) -> Result<()> {
        if self.state != PromptState::Scoring {
            return Err(OproError::invalid_state(format!(
                "prompt '{}' cannot complete scoring from state {:?}",
                self.id, self.state
            )));
        }
        if !(0.0..=100.0).contains(&score) {
            return Err(OproError::invalid_state(format!(
                "score {} outside [0, 100]",
                score
            )));
        }
        self.score = Some((score * 100.0).round() / 100.0);
        self.state = PromptState::Scored;
        Ok(())
    }

    /// Reverts a failed scoring attempt so the prompt can be retried later.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the prompt is `Scoring`.
    pub fn fail_scoring(&mut self) -> Result<()> {
        match self.state {
            PromptState::Scoring => {
                self.state = PromptState::Pending;
                Ok(())
            }
            other => Err(OproError::invalid_state(format!(
                "prompt '{}' cannot fail scoring from state {:?}",
                self.id, other
            ))),
        }
    }
}

/// One generation of candidates within a session.
///
/// Steps are append-only: the prompt list only grows until the session
/// moves past the step; it is never truncated or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Dense step index, strictly increasing by 1 per session
    pub step_number: u32,
    /// Candidate prompts generated in this step
    pub prompts: Vec<Prompt>,
}

impl Step {
    pub fn new(step_number: u32) -> Self {
        Self {
            step_number,
            prompts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// True when every prompt in the step has been scored.
    pub fn all_scored(&self) -> bool {
        self.prompts
            .iter()
            .all(|p| p.state == PromptState::Scored)
    }

    pub fn find_prompt(&self, prompt_id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == prompt_id)
    }

    pub fn find_prompt_mut(&mut self, prompt_id: &str) -> Option<&mut Prompt> {
        self.prompts.iter_mut().find(|p| p.id == prompt_id)
    }
}

/// One full optimization run: configuration plus ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Human-readable session name
    pub name: String,
    /// Step number of the step currently being filled/scored
    pub current_step: u32,
    /// Timestamp when the session was created (RFC 3339)
    pub created_at: String,
    /// Timestamp of the last mutation (RFC 3339)
    pub updated_at: String,
    /// Immutable per-session configuration
    pub config: OproConfig,
    /// Ordered steps; `steps[i].step_number == i`
    pub steps: Vec<Step>,
}

impl Session {
    /// Creates a new session with an empty step 0.
    pub fn new(name: impl Into<String>, config: OproConfig) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            current_step: 0,
            created_at: now.clone(),
            updated_at: now,
            config,
            steps: vec![Step::new(0)],
        }
    }

    /// Refreshes `updated_at`. Called by every mutating operation.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Returns the step currently being filled/scored.
    pub fn current_step(&self) -> &Step {
        // current_step always points at the last element; construction and
        // advance() maintain the invariant
        &self.steps[self.current_step as usize]
    }

    pub fn current_step_mut(&mut self) -> &mut Step {
        &mut self.steps[self.current_step as usize]
    }

    /// Appends candidate texts as new pending prompts to the current step.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the current step already has prompts
    /// (one generation per step).
    pub fn add_candidates(&mut self, texts: Vec<String>) -> Result<Vec<Prompt>> {
        if !self.current_step().is_empty() {
            return Err(OproError::invalid_state(format!(
                "step {} already has prompts; generation runs once per step",
                self.current_step
            )));
        }
        let prompts: Vec<Prompt> = texts.into_iter().map(Prompt::new).collect();
        self.current_step_mut().prompts.extend(prompts.iter().cloned());
        self.touch();
        Ok(prompts)
    }

    /// Opens the next step once the current one is fully scored.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteStep` if the current step is empty or still has
    /// prompts that are not `Scored`. Nothing is mutated on failure.
    pub fn advance(&mut self) -> Result<()> {
        let step = self.current_step();
        if step.is_empty() {
            return Err(OproError::incomplete_step(
                step.step_number,
                "step has no prompts",
            ));
        }
        if !step.all_scored() {
            let unscored = step
                .prompts
                .iter()
                .filter(|p| p.state != PromptState::Scored)
                .count();
            return Err(OproError::incomplete_step(
                step.step_number,
                format!("{} prompt(s) not yet scored", unscored),
            ));
        }
        let next = self.current_step + 1;
        self.steps.push(Step::new(next));
        self.current_step = next;
        self.touch();
        Ok(())
    }

    /// Reverts every prompt stuck at `Scoring` back to `Pending`, using
    /// the same back-edge as a failed scoring attempt. Returns the number
    /// of prompts reverted.
    ///
    /// Called when a session becomes active again: a completion discarded
    /// after a session switch leaves its prompt persisted at `Scoring`,
    /// and no in-flight attempt remains that could finish it. Without the
    /// revert the step could never complete.
    pub fn reclaim_scoring_prompts(&mut self) -> usize {
        let mut reclaimed = 0;
        for step in &mut self.steps {
            for prompt in &mut step.prompts {
                if prompt.state == PromptState::Scoring {
                    prompt.state = PromptState::Pending;
                    reclaimed += 1;
                }
            }
        }
        if reclaimed > 0 {
            self.touch();
        }
        reclaimed
    }

    /// Looks up a prompt in any step by id.
    pub fn find_prompt(&self, prompt_id: &str) -> Option<&Prompt> {
        self.steps.iter().find_map(|s| s.find_prompt(prompt_id))
    }

    pub fn find_prompt_mut(&mut self, prompt_id: &str) -> Option<&mut Prompt> {
        self.steps
            .iter_mut()
            .find_map(|s| s.find_prompt_mut(prompt_id))
    }

    /// All scored prompts across every step, in step/creation order.
    pub fn scored_prompts(&self) -> impl Iterator<Item = &Prompt> {
        self.steps
            .iter()
            .flat_map(|s| s.prompts.iter())
            .filter(|p| p.state == PromptState::Scored)
    }

    /// Checks the structural invariants; used by tests and debug assertions.
    pub fn invariants_hold(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .enumerate()
                .all(|(i, s)| s.step_number == i as u32)
            && self.current_step == self.steps[self.steps.len() - 1].step_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("test", OproConfig::default())
    }

    #[test]
    fn test_new_session_has_empty_step_zero() {
        let s = session();
        assert_eq!(s.current_step, 0);
        assert_eq!(s.steps.len(), 1);
        assert!(s.current_step().is_empty());
        assert!(s.invariants_hold());
    }

    #[test]
    fn test_prompt_lifecycle() {
        let mut p = Prompt::new("Think step by step.");
        assert_eq!(p.state, PromptState::Pending);
        assert!(p.score.is_none());

        p.begin_scoring().unwrap();
        assert_eq!(p.state, PromptState::Scoring);

        p.complete_scoring(66.666).unwrap();
        assert_eq!(p.state, PromptState::Scored);
        assert_eq!(p.score, Some(66.67));
    }

    #[test]
    fn test_prompt_failed_scoring_reverts_to_pending() {
        let mut p = Prompt::new("x");
        p.begin_scoring().unwrap();
        p.fail_scoring().unwrap();
        assert_eq!(p.state, PromptState::Pending);
        assert!(p.score.is_none());

        // retryable: can enter scoring again
        assert!(p.begin_scoring().is_ok());
    }

    #[test]
    fn test_no_edge_out_of_scored() {
        let mut p = Prompt::new("x");
        p.begin_scoring().unwrap();
        p.complete_scoring(50.0).unwrap();

        assert!(p.begin_scoring().unwrap_err().is_invalid_state());
        assert!(p.fail_scoring().is_err());
        assert!(p.complete_scoring(60.0).is_err());
        assert_eq!(p.score, Some(50.0));
    }

    #[test]
    fn test_complete_scoring_rejects_out_of_range() {
        let mut p = Prompt::new("x");
        p.begin_scoring().unwrap();
        assert!(p.complete_scoring(100.01).is_err());
        assert!(p.complete_scoring(-1.0).is_err());
        // still scoring, a valid score can land
        assert!(p.complete_scoring(100.0).is_ok());
    }

    #[test]
    fn test_add_candidates_once_per_step() {
        let mut s = session();
        let prompts = s
            .add_candidates(vec!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(s.current_step().prompts.len(), 2);

        let err = s.add_candidates(vec!["c".to_string()]).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(s.current_step().prompts.len(), 2);
    }

    #[test]
    fn test_advance_requires_non_empty_scored_step() {
        let mut s = session();
        assert!(s.advance().unwrap_err().is_incomplete_step());

        s.add_candidates(vec!["a".to_string()]).unwrap();
        assert!(s.advance().unwrap_err().is_incomplete_step());

        let id = s.current_step().prompts[0].id.clone();
        let p = s.find_prompt_mut(&id).unwrap();
        p.begin_scoring().unwrap();
        p.complete_scoring(80.0).unwrap();

        s.advance().unwrap();
        assert_eq!(s.current_step, 1);
        assert_eq!(s.steps.len(), 2);
        assert!(s.current_step().is_empty());
        assert!(s.invariants_hold());
    }

    #[test]
    fn test_scored_prompts_spans_all_steps() {
        let mut s = session();
        s.add_candidates(vec!["a".to_string()]).unwrap();
        let id = s.current_step().prompts[0].id.clone();
        let p = s.find_prompt_mut(&id).unwrap();
        p.begin_scoring().unwrap();
        p.complete_scoring(10.0).unwrap();
        s.advance().unwrap();

        s.add_candidates(vec!["b".to_string()]).unwrap();
        let id = s.current_step().prompts[0].id.clone();
        let p = s.find_prompt_mut(&id).unwrap();
        p.begin_scoring().unwrap();
        p.complete_scoring(20.0).unwrap();

        let texts: Vec<&str> = s.scored_prompts().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_reclaim_reverts_only_scoring_prompts() {
        let mut s = session();
        s.add_candidates(vec!["a".to_string(), "b".to_string(), "c".to_string()])
            .unwrap();
        let ids: Vec<String> = s.current_step().prompts.iter().map(|p| p.id.clone()).collect();

        let p = s.find_prompt_mut(&ids[0]).unwrap();
        p.begin_scoring().unwrap();
        p.complete_scoring(70.0).unwrap();
        s.find_prompt_mut(&ids[1]).unwrap().begin_scoring().unwrap();

        assert_eq!(s.reclaim_scoring_prompts(), 1);
        assert_eq!(s.find_prompt(&ids[0]).unwrap().state, PromptState::Scored);
        assert_eq!(s.find_prompt(&ids[1]).unwrap().state, PromptState::Pending);
        assert_eq!(s.find_prompt(&ids[2]).unwrap().state, PromptState::Pending);

        // nothing left to reclaim
        assert_eq!(s.reclaim_scoring_prompts(), 0);
    }

    #[test]
    fn test_touch_refreshes_updated_at() {
        let mut s = session();
        let before = s.updated_at.clone();
        std::thread::sleep(std::time::Duration::from_millis(2));
        s.add_candidates(vec!["a".to_string()]).unwrap();
        assert!(s.updated_at >= before);
    }
}
