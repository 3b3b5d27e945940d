//! Model-facing layer for the OPRO loop.
//!
//! Contains the model-client boundary (trait + OpenAI-compatible HTTP
//! implementation), the shared retry policy, the proposer client that
//! requests new candidate instructions, and the scorer engine that
//! evaluates one candidate against the full benchmark.

pub mod client;
pub mod proposer;
pub mod retry;
pub mod scorer;

pub use client::{ModelClient, ModelClientError, OpenAiCompatClient, ScriptedClient};
pub use proposer::Proposer;
pub use retry::RetryPolicy;
pub use scorer::{ScoreOutcome, Scorer};
