//! Storage adapters for the OPRO loop.
//!
//! Implements the `SessionRepository` trait for an in-memory table and
//! for per-session TOML files, and loads the benchmark question set from
//! disk.

mod benchmark_loader;
mod memory_session_repository;
mod toml_session_repository;

pub use benchmark_loader::load_questions;
pub use memory_session_repository::MemorySessionRepository;
pub use toml_session_repository::TomlSessionRepository;
