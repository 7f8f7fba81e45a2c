//! Discriminative selection (Discriminative Information Criterion)
//!
//! `DIC = logL(word) - mean(logL(other words))` under the same candidate
//! model. Higher is better: the criterion rewards models that explain their
//! own word well while explaining competing words poorly. This is the one
//! strategy that reads the full dataset, which must stay immutable for the
//! whole search.

use super::{ScoredCandidate, SelectorConfig};
use crate::dataset::{Dataset, ItemData};
use crate::error::Result;
use crate::hmm::{GaussianHmm, ModelFitter};
use tracing::debug;

pub(crate) fn select<F: ModelFitter>(
    fitter: &F,
    config: &SelectorConfig,
    dataset: &Dataset,
    word: &str,
    item: &ItemData,
) -> Result<Option<GaussianHmm>> {
    // The cross-word mean is undefined with fewer than two words
    if dataset.len() < 2 {
        debug!(word, "DIC requires at least two words, returning no model");
        return Ok(None);
    }

    let mut best: Option<ScoredCandidate> = None;
    for n in config.min_states..=config.max_states {
        match candidate(fitter, dataset, word, item, n) {
            Ok(scored) => {
                debug!(word, n_states = n, dic = scored.score, "candidate scored");
                if best.as_ref().map_or(true, |b| scored.score > b.score) {
                    best = Some(scored);
                }
            }
            Err(err) => {
                debug!(word, n_states = n, error = %err, "candidate failed, skipping");
            }
        }
    }

    Ok(best.map(|b| b.model))
}

/// Fit and score one candidate; any fit or score failure (including on a
/// competing word's data) discards the whole candidate.
fn candidate<F: ModelFitter>(
    fitter: &F,
    dataset: &Dataset,
    word: &str,
    item: &ItemData,
    n_states: usize,
) -> Result<ScoredCandidate> {
    let model = fitter.fit(item, n_states)?;
    let log_l_self = fitter.score(&model, item.x(), item.lengths())?;

    let mut sum_other = 0.0;
    let mut n_other = 0usize;
    for (other_word, other) in dataset.iter() {
        if other_word == word {
            continue;
        }
        sum_other += fitter.score(&model, other.x(), other.lengths())?;
        n_other += 1;
    }

    let score = log_l_self - sum_other / n_other as f64;
    Ok(ScoredCandidate { model, score })
}
