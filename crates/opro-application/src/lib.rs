//! Orchestration layer for the OPRO loop.
//!
//! Exposes [`OproUseCase`], the state machine driving the
//! generate -> score -> advance cycle over sessions, plus the batch
//! scoring report types.

mod opro_usecase;

pub use opro_usecase::{BatchOutcome, OproUseCase, ScoreReport};
