//! Domain layer for the OPRO optimization loop.
//!
//! Holds the session/step/prompt state model, the per-session
//! configuration, the meta-prompt synthesizer, and the repository
//! interface the storage adapters implement. Model calls live in
//! `opro-engine`; orchestration lives in `opro-application`.

pub mod benchmark;
pub mod error;
pub mod meta_prompt;
pub mod metrics;
pub mod session;

// Re-export common error type
pub use error::{OproError, Result};
