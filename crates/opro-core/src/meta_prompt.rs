//! Meta-prompt synthesis.
//!
//! Builds the natural-language search prompt sent to the proposer model.
//! Pure given its sampler: no side effects, deterministic for a fixed
//! sample. Two shapes are rendered:
//!
//! - step 0: task explanation plus a few benchmark exemplars
//! - later steps: the top-X scored candidates so far (presented ascending,
//!   lowest kept score first) plus fresh exemplars
//!
//! Candidate texts are wrapped in `<INS>` / `</INS>` delimiters; the
//! proposer client strips these if the model echoes them back.

use crate::benchmark::QuestionAnswer;
use crate::session::Session;
use std::collections::HashMap;
use std::fmt::Write;

/// Number of benchmark exemplars embedded in each meta-prompt.
pub const EXEMPLAR_COUNT: usize = 3;

/// Opening delimiter around candidate instructions in rendered prompts.
pub const INSTRUCTION_OPEN: &str = "<INS>";
/// Closing delimiter around candidate instructions in rendered prompts.
pub const INSTRUCTION_CLOSE: &str = "</INS>";

/// A "pick n of m" capability, injectable so tests can supply
/// deterministic samples.
pub trait Sampler: Send + Sync {
    /// Returns `n` distinct indices drawn uniformly from `0..population`,
    /// clamping `n` to the population size.
    fn sample_indices(&self, population: usize, n: usize) -> Vec<usize>;
}

/// Production sampler backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandSampler;

impl Sampler for RandSampler {
    fn sample_indices(&self, population: usize, n: usize) -> Vec<usize> {
        let n = n.min(population);
        rand::seq::index::sample(&mut rand::thread_rng(), population, n).into_vec()
    }
}

/// Deterministic sampler returning the first `n` indices, for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialSampler;

impl Sampler for SequentialSampler {
    fn sample_indices(&self, population: usize, n: usize) -> Vec<usize> {
        (0..n.min(population)).collect()
    }
}

/// Collects every scored prompt across all steps into a deduplicated,
/// ranked pool, ready for presentation.
///
/// Deduplication keeps, per distinct text, the highest score seen; ties
/// keep the first-seen entry (only a strict `>` replaces the incumbent).
/// The pool is sorted by score descending, truncated to `top_x`, then
/// reversed so the caller renders it ascending — a framing choice for the
/// proposer model, not an optimization.
pub fn ranked_pool(session: &Session, top_x: usize) -> Vec<(String, f64)> {
    let mut order: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for prompt in session.scored_prompts() {
        let Some(score) = prompt.score else { continue };
        match index.get(&prompt.text) {
            Some(&i) => {
                if score > order[i].1 {
                    order[i].1 = score;
                }
            }
            None => {
                index.insert(prompt.text.clone(), order.len());
                order.push((prompt.text.clone(), score));
            }
        }
    }

    // stable sort keeps first-seen entries ahead on equal scores
    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    order.truncate(top_x);
    order.reverse();
    order
}

/// Synthesizes meta-prompts from session history and benchmark exemplars.
pub struct MetaPromptSynthesizer {
    sampler: Box<dyn Sampler>,
}

impl MetaPromptSynthesizer {
    pub fn new(sampler: Box<dyn Sampler>) -> Self {
        Self { sampler }
    }

    /// Renders the next search prompt for the given session.
    pub fn synthesize(&self, session: &Session, benchmark: &[QuestionAnswer]) -> String {
        let exemplars = self.draw_exemplars(benchmark);
        if session.current_step == 0 {
            render_initial(session.config.k, &exemplars)
        } else {
            let pool = ranked_pool(session, session.config.top_x);
            render_continuation(session.config.k, &pool, &exemplars)
        }
    }

    fn draw_exemplars<'a>(&self, benchmark: &'a [QuestionAnswer]) -> Vec<&'a QuestionAnswer> {
        self.sampler
            .sample_indices(benchmark.len(), EXEMPLAR_COUNT)
            .into_iter()
            .map(|i| &benchmark[i])
            .collect()
    }
}

impl Default for MetaPromptSynthesizer {
    fn default() -> Self {
        Self::new(Box::new(RandSampler))
    }
}

fn render_exemplars(out: &mut String, exemplars: &[&QuestionAnswer]) {
    for qa in exemplars {
        let _ = writeln!(out, "Q: {}", qa.question);
        let _ = writeln!(out, "A: {}", qa.gold_answer);
        out.push('\n');
    }
}

fn render_initial(k: u8, exemplars: &[&QuestionAnswer]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Your task is to write instruction templates for solving math word \
         problems. An instruction is prepended to each problem before it is \
         given to a solver model. Here are some example problems with their \
         correct answers:\n"
    );
    render_exemplars(&mut out, exemplars);
    let _ = writeln!(
        out,
        "Write {k} new instructions. Each instruction should be a single \
         piece of text that helps the solver reach the correct numeric \
         answer. Wrap each instruction in {INSTRUCTION_OPEN} and \
         {INSTRUCTION_CLOSE}."
    );
    let _ = writeln!(
        out,
        "Reply with a JSON object of the form {{\"instructions\": [\"...\"]}} \
         containing exactly {k} entries."
    );
    out
}

fn render_continuation(k: u8, pool: &[(String, f64)], exemplars: &[&QuestionAnswer]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Your task is to write instruction templates for solving math word \
         problems. Below are previous instructions with their accuracy scores \
         (0-100), from lowest to highest kept score:\n"
    );
    for (text, score) in pool {
        let _ = writeln!(out, "text: {INSTRUCTION_OPEN}{text}{INSTRUCTION_CLOSE}");
        let _ = writeln!(out, "score: {score}\n");
    }
    let _ = writeln!(out, "Here are some example problems with their correct answers:\n");
    render_exemplars(&mut out, exemplars);
    let _ = writeln!(
        out,
        "Write {k} new instructions that are different from the ones above \
         but adjacent in style to the highest-scoring ones, aiming for a \
         higher score. Wrap each instruction in {INSTRUCTION_OPEN} and \
         {INSTRUCTION_CLOSE}."
    );
    let _ = writeln!(
        out,
        "Reply with a JSON object of the form {{\"instructions\": [\"...\"]}} \
         containing exactly {k} entries."
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{OproConfig, Session};

    fn benchmark() -> Vec<QuestionAnswer> {
        vec![
            QuestionAnswer::new("2 + 2?", 4.0),
            QuestionAnswer::new("3 * 5?", 15.0),
            QuestionAnswer::new("10 - 7?", 3.0),
            QuestionAnswer::new("9 / 3?", 3.0),
        ]
    }

    fn session_with_scores(entries: &[(&str, f64)]) -> Session {
        let mut s = Session::new("test", OproConfig::default());
        s.add_candidates(entries.iter().map(|(t, _)| t.to_string()).collect())
            .unwrap();
        let ids: Vec<String> = s.current_step().prompts.iter().map(|p| p.id.clone()).collect();
        for (id, (_, score)) in ids.iter().zip(entries) {
            let p = s.find_prompt_mut(id).unwrap();
            p.begin_scoring().unwrap();
            p.complete_scoring(*score).unwrap();
        }
        s.advance().unwrap();
        s
    }

    #[test]
    fn test_initial_prompt_contains_exemplars_and_k() {
        let synth = MetaPromptSynthesizer::new(Box::new(SequentialSampler));
        let session = Session::new("test", OproConfig::default());
        let prompt = synth.synthesize(&session, &benchmark());

        assert!(prompt.contains("Q: 2 + 2?"));
        assert!(prompt.contains("A: 4"));
        assert!(prompt.contains("Q: 10 - 7?"));
        // only 3 exemplars drawn
        assert!(!prompt.contains("9 / 3?"));
        assert!(prompt.contains("Write 8 new instructions"));
    }

    #[test]
    fn test_exemplar_sample_clamps_to_benchmark_size() {
        let synth = MetaPromptSynthesizer::new(Box::new(SequentialSampler));
        let session = Session::new("test", OproConfig::default());
        let small = vec![QuestionAnswer::new("1 + 1?", 2.0)];
        let prompt = synth.synthesize(&session, &small);
        assert!(prompt.contains("Q: 1 + 1?"));
    }

    #[test]
    fn test_dedup_keeps_highest_score_per_text() {
        let session = session_with_scores(&[("same text", 40.0), ("same text", 90.0)]);
        let pool = ranked_pool(&session, 10);
        assert_eq!(pool, vec![("same text".to_string(), 90.0)]);
    }

    #[test]
    fn test_dedup_tie_keeps_first_seen() {
        // strict > replacement: an equal later score does not replace
        let session = session_with_scores(&[("a", 50.0), ("a", 50.0), ("b", 50.0)]);
        let pool = ranked_pool(&session, 10);
        assert_eq!(pool.len(), 2);
        // stable descending sort then reverse: first-seen "a" ends up last
        assert_eq!(pool[0].0, "b");
        assert_eq!(pool[1].0, "a");
    }

    #[test]
    fn test_top_x_truncates_then_presents_ascending() {
        let session = session_with_scores(&[("p10", 10.0), ("p50", 50.0), ("p30", 30.0)]);
        let pool = ranked_pool(&session, 2);
        assert_eq!(
            pool,
            vec![("p30".to_string(), 30.0), ("p50".to_string(), 50.0)]
        );
    }

    #[test]
    fn test_continuation_renders_pool_in_order() {
        let mut session = session_with_scores(&[("p10", 10.0), ("p50", 50.0), ("p30", 30.0)]);
        session.config.top_x = 2;
        let synth = MetaPromptSynthesizer::new(Box::new(SequentialSampler));
        let prompt = synth.synthesize(&session, &benchmark());

        let i30 = prompt.find("<INS>p30</INS>").expect("p30 rendered");
        let i50 = prompt.find("<INS>p50</INS>").expect("p50 rendered");
        assert!(i30 < i50, "ascending presentation");
        assert!(!prompt.contains("p10"), "truncated below top_x");
    }

    #[test]
    fn test_continuation_with_empty_pool_still_renders() {
        let empty = Session::new("fresh", OproConfig::default());
        assert!(ranked_pool(&empty, 5).is_empty());

        // rendering with an empty pool still produces a usable prompt
        let prompt = render_continuation(4, &[], &[]);
        assert!(prompt.contains("Write 4 new instructions"));
    }
}
