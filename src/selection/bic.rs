//! Penalized-likelihood selection (Bayesian Information Criterion)
//!
//! `BIC = -2 * logL + p * ln(N)` where `p` is the free-parameter count of the
//! candidate and `N` the word's total observation count. Lower is better.

use super::{ScoredCandidate, SelectorConfig};
use crate::dataset::ItemData;
use crate::error::Result;
use crate::hmm::{GaussianHmm, ModelFitter};
use tracing::debug;

/// Free parameters of a diagonal-covariance Gaussian HMM: transition rows
/// (`n * (n - 1)`), initial-state probabilities (`n - 1`), and per-state
/// means and variances (`2 * d * n`).
pub(crate) fn free_parameters(n_states: usize, n_features: usize) -> usize {
    n_states * (n_states - 1) + (n_states - 1) + 2 * n_features * n_states
}

pub(crate) fn select<F: ModelFitter>(
    fitter: &F,
    config: &SelectorConfig,
    word: &str,
    item: &ItemData,
) -> Result<Option<GaussianHmm>> {
    let n_obs = item.n_samples() as f64;
    let mut best: Option<ScoredCandidate> = None;

    for n in config.min_states..=config.max_states {
        let model = match fitter.fit(item, n) {
            Ok(model) => model,
            Err(err) => {
                debug!(word, n_states = n, error = %err, "candidate fit failed, skipping");
                continue;
            }
        };
        let log_l = match fitter.score(&model, item.x(), item.lengths()) {
            Ok(ll) => ll,
            Err(err) => {
                debug!(word, n_states = n, error = %err, "candidate score failed, skipping");
                continue;
            }
        };

        let p = free_parameters(n, item.n_features()) as f64;
        let score = -2.0 * log_l + p * n_obs.ln();
        debug!(word, n_states = n, bic = score, "candidate scored");

        if best.as_ref().map_or(true, |b| score < b.score) {
            best = Some(ScoredCandidate { model, score });
        }
    }

    Ok(best.map(|b| b.model))
}
