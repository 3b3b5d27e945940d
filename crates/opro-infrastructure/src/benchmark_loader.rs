//! Benchmark file loader.
//!
//! Loads the question/answer benchmark from a JSON file once at startup.
//! On-disk shape is a plain array:
//!
//! ```json
//! [
//!   {"question": "Natalia sold clips to 48 friends...", "answer": 72},
//!   {"question": "..." , "answer": 10.5}
//! ]
//! ```

use opro_core::benchmark::{Benchmark, QuestionAnswer, benchmark_from};
use opro_core::error::{OproError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct QuestionAnswerFile {
    question: String,
    answer: f64,
}

/// Loads the ordered question set from `path`.
///
/// # Errors
///
/// Returns an IO or JSON error for unreadable files, and
/// `OproError::EmptyBenchmark` if the file holds no questions.
pub fn load_questions(path: impl AsRef<Path>) -> Result<Benchmark> {
    let content = fs::read_to_string(path.as_ref())?;
    let entries: Vec<QuestionAnswerFile> = serde_json::from_str(&content)?;

    if entries.is_empty() {
        return Err(OproError::EmptyBenchmark);
    }

    tracing::info!(
        path = %path.as_ref().display(),
        count = entries.len(),
        "loaded benchmark"
    );

    Ok(benchmark_from(
        entries
            .into_iter()
            .map(|e| QuestionAnswer::new(e.question, e.answer))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_loads_ordered_questions() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"question": "2 + 2?", "answer": 4}}, {{"question": "half of 5?", "answer": 2.5}}]"#
        )
        .unwrap();

        let benchmark = load_questions(file.path()).unwrap();
        assert_eq!(benchmark.len(), 2);
        assert_eq!(benchmark[0].question, "2 + 2?");
        assert_eq!(benchmark[0].gold_answer, 4.0);
        assert_eq!(benchmark[1].gold_answer, 2.5);
    }

    #[test]
    fn test_empty_file_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        let err = load_questions(file.path()).unwrap_err();
        assert!(matches!(err, OproError::EmptyBenchmark));
    }

    #[test]
    fn test_malformed_json_is_a_serialization_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = load_questions(file.path()).unwrap_err();
        assert!(matches!(err, OproError::Serialization { .. }));
    }
}
