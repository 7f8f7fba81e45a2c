//! Cross-validated selection
//!
//! Each candidate state count is scored by its mean held-out log-likelihood
//! over k folds of the word's own sequences: per fold, a model is trained on
//! the training split only and scored on the held-out split. The state count
//! with the best mean is refit once on the full data; the fold models exist
//! only to produce held-out scores. Words with too few sequences fall back to
//! the constant strategy.

use super::{constant, folds, SelectorConfig};
use crate::dataset::ItemData;
use crate::error::Result;
use crate::hmm::{GaussianHmm, ModelFitter};
use tracing::debug;

pub(crate) fn select<F: ModelFitter>(
    fitter: &F,
    config: &SelectorConfig,
    word: &str,
    item: &ItemData,
) -> Result<Option<GaussianHmm>> {
    if item.n_sequences() < config.n_folds {
        debug!(
            word,
            sequences = item.n_sequences(),
            n_folds = config.n_folds,
            "too few sequences for cross-validation, falling back to constant"
        );
        return constant(fitter, config, word, item);
    }

    let splits = folds::k_fold(item.n_sequences(), config.n_folds, None)?;

    let mut best: Option<(usize, f64)> = None;
    for n in config.min_states..=config.max_states {
        let mut fold_scores = Vec::with_capacity(splits.len());
        for split in &splits {
            let train = match item.subset(&split.train) {
                Ok(train) => train,
                Err(err) => {
                    debug!(word, n_states = n, error = %err, "fold train split invalid, skipping fold");
                    continue;
                }
            };
            let model = match fitter.fit(&train, n) {
                Ok(model) => model,
                Err(err) => {
                    debug!(word, n_states = n, error = %err, "fold fit failed, skipping fold");
                    continue;
                }
            };
            let (test_x, test_lengths) = match item.combine(&split.test) {
                Ok(held_out) => held_out,
                Err(err) => {
                    debug!(word, n_states = n, error = %err, "fold test split invalid, skipping fold");
                    continue;
                }
            };
            match fitter.score(&model, &test_x, &test_lengths) {
                Ok(score) => fold_scores.push(score),
                Err(err) => {
                    debug!(word, n_states = n, error = %err, "fold score failed, skipping fold");
                }
            }
        }

        if fold_scores.is_empty() {
            debug!(word, n_states = n, "no fold produced a score, skipping candidate");
            continue;
        }
        let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        debug!(word, n_states = n, cv_score = mean, "candidate scored");
        if best.map_or(true, |(_, b)| mean > b) {
            best = Some((n, mean));
        }
    }

    match best {
        // Refit the winning state count once on the full data
        Some((n, _)) => match fitter.fit(item, n) {
            Ok(model) => Ok(Some(model)),
            Err(err) => {
                debug!(word, n_states = n, error = %err, "refit on full data failed");
                Ok(None)
            }
        },
        None => constant(fitter, config, word, item),
    }
}
