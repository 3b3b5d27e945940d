//! Session domain module.
//!
//! This module contains all session-related domain models, the per-session
//! configuration, and the repository interface.
//!
//! # Module Structure
//!
//! - `model`: Core domain entities (`Session`, `Step`, `Prompt`, `PromptState`)
//! - `config`: Per-session optimization configuration (`OproConfig`)
//! - `repository`: Repository trait for session persistence

mod config;
mod model;
mod repository;

// Re-export public API
pub use config::{MAX_CANDIDATES_PER_STEP, OproConfig, TEMPERATURE_RANGE};
pub use model::{Prompt, PromptState, Session, Step};
pub use repository::SessionRepository;
