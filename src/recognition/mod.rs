//! Recognition of unseen sequences against a trained model set
//!
//! Every test sequence is scored against every trained word model; the word
//! with the maximal log-likelihood is the guess. Scoring failures record
//! negative infinity and never abort a sequence's classification.

use crate::error::Result;
use crate::hmm::GaussianHmm;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Insertion-ordered mapping from word to its trained model.
///
/// Iteration order is insertion order, which fixes both the layout of
/// per-sequence score lists and the arg-max tie-break during recognition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordModels {
    entries: Vec<(String, GaussianHmm)>,
}

impl WordModels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model set from selection results, skipping words for which no
    /// model could be selected.
    pub fn from_selection(results: BTreeMap<String, Option<GaussianHmm>>) -> Self {
        let entries = results
            .into_iter()
            .filter_map(|(word, model)| model.map(|m| (word, m)))
            .collect();
        Self { entries }
    }

    /// Insert a model, replacing an existing entry for the same word in place
    /// (its position in the iteration order is preserved).
    pub fn insert(&mut self, word: impl Into<String>, model: GaussianHmm) {
        let word = word.into();
        if let Some(entry) = self.entries.iter_mut().find(|(w, _)| *w == word) {
            entry.1 = model;
        } else {
            self.entries.push((word, model));
        }
    }

    pub fn get(&self, word: &str) -> Option<&GaussianHmm> {
        self.entries
            .iter()
            .find(|(w, _)| w == word)
            .map(|(_, m)| m)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GaussianHmm)> {
        self.entries.iter().map(|(w, m)| (w, m))
    }

    pub fn words(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(w, _)| w)
    }

    /// Save the model set to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a model set from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let models: Self = serde_json::from_str(&json)?;
        Ok(models)
    }
}

/// Per-sequence scores and guesses, index-aligned to the test input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionOutput {
    /// For each test sequence, every model's log-likelihood in the model
    /// set's insertion order.
    pub scores: Vec<Vec<(String, f64)>>,
    /// For each test sequence, the word with the maximal score. `None` only
    /// when the model set is empty.
    pub guesses: Vec<Option<String>>,
}

impl RecognitionOutput {
    /// Fraction of guesses matching the expected words, index-aligned.
    /// Missing guesses count as wrong.
    pub fn accuracy(&self, expected: &[&str]) -> f64 {
        if expected.is_empty() {
            return 0.0;
        }
        let correct = self
            .guesses
            .iter()
            .zip(expected.iter())
            .filter(|(guess, want)| guess.as_deref() == Some(**want))
            .count();
        correct as f64 / expected.len() as f64
    }
}

/// Score each test sequence against every trained model and guess the word
/// with the maximal log-likelihood.
///
/// A model that fails to score a sequence records `f64::NEG_INFINITY` for it;
/// ties (including the all-failures case, where every score is negative
/// infinity) resolve to the first-encountered model in insertion order.
/// Output order matches the test-sequence order.
pub fn recognize(models: &WordModels, test: &[(Array2<f64>, Vec<usize>)]) -> RecognitionOutput {
    let mut scores = Vec::with_capacity(test.len());
    let mut guesses = Vec::with_capacity(test.len());

    for (x, lengths) in test {
        let mut sequence_scores = Vec::with_capacity(models.len());
        let mut best: Option<(&String, f64)> = None;

        for (word, model) in models.iter() {
            let log_l = match model.log_likelihood(x, lengths) {
                Ok(ll) => ll,
                Err(err) => {
                    debug!(word = word.as_str(), error = %err, "scoring failed, recording -inf");
                    f64::NEG_INFINITY
                }
            };
            sequence_scores.push((word.clone(), log_l));
            if best.map_or(true, |(_, b)| log_l > b) {
                best = Some((word, log_l));
            }
        }

        scores.push(sequence_scores);
        guesses.push(best.map(|(word, _)| word.clone()));
    }

    RecognitionOutput { scores, guesses }
}
