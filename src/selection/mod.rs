//! Model selection strategies
//!
//! Each strategy searches hidden-state counts over a closed range, fits a
//! candidate model per count, scores it by its own statistical criterion, and
//! keeps the single best model. A candidate that fails to fit or score is
//! skipped; the search continues. If every candidate fails the word is simply
//! unrepresented (`Ok(None)`).

mod bic;
mod cv;
mod dic;
pub mod folds;

pub use folds::{k_fold, FoldSplit};

use crate::dataset::{Dataset, ItemData};
use crate::error::{Result, SeqselError};
use crate::hmm::{BaumWelchFitter, GaussianHmm, ModelFitter};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Configuration shared by all selection strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Lower bound of the hidden-state search range (inclusive).
    pub min_states: usize,
    /// Upper bound of the hidden-state search range (inclusive).
    pub max_states: usize,
    /// State count used by the Constant strategy and the CV fallback.
    pub n_constant: usize,
    /// Seed threaded into the model fitter.
    pub random_state: u64,
    /// Fold count for cross-validated selection.
    pub n_folds: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_states: 2,
            max_states: 10,
            n_constant: 3,
            random_state: 14,
            n_folds: 3,
        }
    }
}

impl SelectorConfig {
    pub fn with_state_range(mut self, min_states: usize, max_states: usize) -> Self {
        self.min_states = min_states;
        self.max_states = max_states;
        self
    }

    pub fn with_n_constant(mut self, n_constant: usize) -> Self {
        self.n_constant = n_constant;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_states == 0 || self.n_constant == 0 {
            return Err(SeqselError::ValidationError(
                "state counts must be at least 1".to_string(),
            ));
        }
        if self.min_states > self.max_states {
            return Err(SeqselError::ValidationError(format!(
                "min_states ({}) must not exceed max_states ({})",
                self.min_states, self.max_states
            )));
        }
        if self.n_folds < 2 {
            return Err(SeqselError::ValidationError(
                "n_folds must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// The closed set of selection criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionCriterion {
    /// Fit a single model at the configured constant state count.
    Constant,
    /// Bayesian Information Criterion: penalized likelihood, lower is better.
    Bic,
    /// Discriminative Information Criterion: own-word likelihood minus the
    /// mean likelihood over all other words, higher is better.
    Dic,
    /// Mean held-out log-likelihood over k folds, higher is better.
    CrossValidation,
}

/// A candidate model together with its criterion score.
///
/// Score semantics depend on the strategy: lower is better for BIC, higher is
/// better for DIC and CV.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub model: GaussianHmm,
    pub score: f64,
}

/// Runs one selection criterion over a dataset's words.
#[derive(Debug, Clone)]
pub struct ModelSelector<F = BaumWelchFitter> {
    criterion: SelectionCriterion,
    config: SelectorConfig,
    fitter: F,
}

impl ModelSelector<BaumWelchFitter> {
    /// Create a selector backed by the bundled Baum-Welch fitter, seeded from
    /// the configuration.
    pub fn new(criterion: SelectionCriterion, config: SelectorConfig) -> Result<Self> {
        config.validate()?;
        let fitter = BaumWelchFitter::new(config.random_state);
        Ok(Self {
            criterion,
            config,
            fitter,
        })
    }
}

impl<F: ModelFitter> ModelSelector<F> {
    /// Create a selector with a caller-supplied fitter.
    pub fn with_fitter(
        criterion: SelectionCriterion,
        config: SelectorConfig,
        fitter: F,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            criterion,
            config,
            fitter,
        })
    }

    pub fn criterion(&self) -> SelectionCriterion {
        self.criterion
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select the best-fitting model for one word.
    ///
    /// Returns `Ok(None)` when no candidate in the search range could be fit
    /// and scored; an unknown word is a caller error.
    pub fn select(&self, dataset: &Dataset, word: &str) -> Result<Option<GaussianHmm>> {
        let item = dataset.get(word).ok_or_else(|| {
            SeqselError::ValidationError(format!("word {word:?} not present in dataset"))
        })?;

        let selected = match self.criterion {
            SelectionCriterion::Constant => {
                constant(&self.fitter, &self.config, word, item)?
            }
            SelectionCriterion::Bic => bic::select(&self.fitter, &self.config, word, item)?,
            SelectionCriterion::Dic => {
                dic::select(&self.fitter, &self.config, dataset, word, item)?
            }
            SelectionCriterion::CrossValidation => {
                cv::select(&self.fitter, &self.config, word, item)?
            }
        };

        if selected.is_none() {
            warn!(word, criterion = ?self.criterion, "no model could be selected");
        }
        Ok(selected)
    }

    /// Run selection for every word in the dataset, in parallel.
    ///
    /// Per-word runs are independent and read the dataset immutably, so they
    /// parallelize safely.
    pub fn select_all(&self, dataset: &Dataset) -> Result<BTreeMap<String, Option<GaussianHmm>>>
    where
        F: Sync,
    {
        let words: Vec<&String> = dataset.words().collect();
        let results: BTreeMap<String, Option<GaussianHmm>> = words
            .par_iter()
            .map(|word| {
                self.select(dataset, word.as_str())
                    .map(|model| ((*word).clone(), model))
            })
            .collect::<Result<_>>()?;

        let trained = results.values().filter(|m| m.is_some()).count();
        info!(
            words = results.len(),
            trained,
            criterion = ?self.criterion,
            "selection finished"
        );
        Ok(results)
    }
}

/// Fit exactly one model at the configured constant state count.
///
/// Shared by the Constant strategy and the CV fallback path.
pub(crate) fn constant<F: ModelFitter>(
    fitter: &F,
    config: &SelectorConfig,
    word: &str,
    item: &ItemData,
) -> Result<Option<GaussianHmm>> {
    match fitter.fit(item, config.n_constant) {
        Ok(model) => Ok(Some(model)),
        Err(err) => {
            debug!(word, n_states = config.n_constant, error = %err, "constant fit failed");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_reference_defaults() {
        let config = SelectorConfig::default();
        assert_eq!(config.min_states, 2);
        assert_eq!(config.max_states, 10);
        assert_eq!(config.n_constant, 3);
        assert_eq!(config.random_state, 14);
        assert_eq!(config.n_folds, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(SelectorConfig::default()
            .with_state_range(5, 2)
            .validate()
            .is_err());
        assert!(SelectorConfig::default()
            .with_state_range(0, 2)
            .validate()
            .is_err());
        assert!(SelectorConfig::default().with_n_folds(1).validate().is_err());
    }

    #[test]
    fn test_selector_rejects_invalid_config() {
        let config = SelectorConfig::default().with_state_range(4, 2);
        assert!(ModelSelector::new(SelectionCriterion::Bic, config).is_err());
    }

    #[test]
    fn test_select_unknown_word_is_an_error() {
        let selector =
            ModelSelector::new(SelectionCriterion::Constant, SelectorConfig::default()).unwrap();
        let dataset = Dataset::new();
        assert!(selector.select(&dataset, "MISSING").is_err());
    }
}
