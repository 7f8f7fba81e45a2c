//! Per-word observation sequences
//!
//! A [`Dataset`] maps each vocabulary word to its [`ItemData`]: the word's
//! observation sequences stacked into one feature matrix with a parallel
//! length vector, plus the raw per-sequence matrices so subsets can be
//! re-stacked for cross-validation.

use crate::error::{Result, SeqselError};
use ndarray::{concatenate, Array2, Axis};
use std::collections::BTreeMap;

/// Observation data for one vocabulary word.
///
/// Invariants (enforced at construction): every sequence has the same feature
/// dimensionality and at least one row; `lengths` parallels `sequences`; the
/// stacked matrix has `sum(lengths)` rows.
#[derive(Debug, Clone)]
pub struct ItemData {
    x: Array2<f64>,
    lengths: Vec<usize>,
    sequences: Vec<Array2<f64>>,
}

impl ItemData {
    /// Build an item from its raw observation sequences.
    pub fn from_sequences(sequences: Vec<Array2<f64>>) -> Result<Self> {
        if sequences.is_empty() {
            return Err(SeqselError::ValidationError(
                "item must have at least one sequence".to_string(),
            ));
        }
        let n_features = sequences[0].ncols();
        if n_features == 0 {
            return Err(SeqselError::ValidationError(
                "sequences must have at least one feature".to_string(),
            ));
        }
        for (i, seq) in sequences.iter().enumerate() {
            if seq.nrows() == 0 {
                return Err(SeqselError::ValidationError(format!(
                    "sequence {} is empty",
                    i
                )));
            }
            if seq.ncols() != n_features {
                return Err(SeqselError::ValidationError(format!(
                    "sequence {} has {} features, expected {}",
                    i,
                    seq.ncols(),
                    n_features
                )));
            }
        }

        let lengths: Vec<usize> = sequences.iter().map(|s| s.nrows()).collect();
        let views: Vec<_> = sequences.iter().map(|s| s.view()).collect();
        let x = concatenate(Axis(0), &views)?;

        Ok(Self {
            x,
            lengths,
            sequences,
        })
    }

    /// Stacked feature matrix, `sum(lengths)` rows by `n_features` columns.
    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    /// Per-sequence row counts, parallel to [`sequences`](Self::sequences).
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// The raw observation sequences.
    pub fn sequences(&self) -> &[Array2<f64>] {
        &self.sequences
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Total observation count across all sequences.
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_sequences(&self) -> usize {
        self.sequences.len()
    }

    /// Re-stack a subset of sequences into a (matrix, lengths) pair.
    ///
    /// Used to derive held-out fold data during cross-validation.
    pub fn combine(&self, indices: &[usize]) -> Result<(Array2<f64>, Vec<usize>)> {
        if indices.is_empty() {
            return Err(SeqselError::ValidationError(
                "cannot combine an empty index set".to_string(),
            ));
        }
        let mut views = Vec::with_capacity(indices.len());
        let mut lengths = Vec::with_capacity(indices.len());
        for &i in indices {
            let seq = self.sequences.get(i).ok_or_else(|| {
                SeqselError::ValidationError(format!(
                    "sequence index {} out of range ({} sequences)",
                    i,
                    self.sequences.len()
                ))
            })?;
            views.push(seq.view());
            lengths.push(seq.nrows());
        }
        let x = concatenate(Axis(0), &views)?;
        Ok((x, lengths))
    }

    /// Build a new item from a subset of this item's sequences.
    ///
    /// Used to derive per-fold training data during cross-validation.
    pub fn subset(&self, indices: &[usize]) -> Result<ItemData> {
        let mut sequences = Vec::with_capacity(indices.len());
        for &i in indices {
            let seq = self.sequences.get(i).ok_or_else(|| {
                SeqselError::ValidationError(format!(
                    "sequence index {} out of range ({} sequences)",
                    i,
                    self.sequences.len()
                ))
            })?;
            sequences.push(seq.clone());
        }
        ItemData::from_sequences(sequences)
    }
}

/// Mapping from word to its observation data.
///
/// Immutable during a selection run; shared by reference across strategies.
/// Iteration order is the sorted word order, which keeps batch runs
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    items: BTreeMap<String, ItemData>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: impl Into<String>, item: ItemData) {
        self.items.insert(word.into(), item);
    }

    pub fn get(&self, word: &str) -> Option<&ItemData> {
        self.items.get(word)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ItemData)> {
        self.items.iter()
    }
}
