//! Baum-Welch (EM) training for Gaussian HMMs

use super::{backward_log, forward_log, GaussianHmm, EPSILON};
use crate::dataset::ItemData;
use crate::error::{Result, SeqselError};
use ndarray::{s, Array1, Array2};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Contract for fitting and scoring per-word sequence models.
///
/// `fit` must be deterministic for a fixed seed and must return an error
/// (never panic) when the requested state count is incompatible with the data
/// or the optimization fails to converge to a valid probability model.
/// Selection strategies depend only on this trait.
pub trait ModelFitter {
    /// Train a model with `n_states` hidden states on one word's data.
    fn fit(&self, item: &ItemData, n_states: usize) -> Result<GaussianHmm>;

    /// Log-likelihood of stacked observations under a trained model.
    fn score(&self, model: &GaussianHmm, x: &Array2<f64>, lengths: &[usize]) -> Result<f64> {
        model.log_likelihood(x, lengths)
    }
}

/// Baum-Welch fitter for diagonal-covariance Gaussian HMMs.
///
/// Initialization assigns observations to states by a seeded shuffle-and-chunk
/// of the pooled frames, so results are reproducible for a fixed
/// `random_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaumWelchFitter {
    /// Iteration cap for the EM loop.
    pub max_iter: usize,
    /// Convergence threshold on log-likelihood improvement.
    pub tol: f64,
    /// Seed for the state-assignment initialization.
    pub random_state: u64,
    /// Lower bound applied to emission variances.
    pub var_floor: f64,
}

impl Default for BaumWelchFitter {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-4,
            random_state: 14,
            var_floor: 1e-3,
        }
    }
}

impl BaumWelchFitter {
    pub fn new(random_state: u64) -> Self {
        Self {
            random_state,
            ..Self::default()
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_var_floor(mut self, var_floor: f64) -> Self {
        self.var_floor = var_floor;
        self
    }

    /// Seeded initialization: pick spread-apart seed frames (k-means++ style),
    /// assign every pooled frame to its nearest seed, and use per-group
    /// statistics as emission parameters. Initial and transition probabilities
    /// start uniform.
    fn initialize(
        &self,
        item: &ItemData,
        n_states: usize,
    ) -> (Array1<f64>, Array2<f64>, Array2<f64>, Array2<f64>) {
        let x = item.x();
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        // Seed frames spread apart by squared-distance weighting
        let mut seeds = Vec::with_capacity(n_states);
        seeds.push((rng.next_u64() as usize) % n_samples);
        while seeds.len() < n_states {
            let dists: Vec<f64> = (0..n_samples)
                .map(|r| {
                    seeds
                        .iter()
                        .map(|&s| {
                            (0..n_features)
                                .map(|d| (x[[r, d]] - x[[s, d]]).powi(2))
                                .sum::<f64>()
                        })
                        .fold(f64::MAX, f64::min)
                })
                .collect();
            let total: f64 = dists.iter().sum();
            if total <= 0.0 {
                seeds.push((rng.next_u64() as usize) % n_samples);
                continue;
            }
            let r = (rng.next_u64() as f64 / u64::MAX as f64) * total;
            let mut cumulative = 0.0;
            let mut chosen = 0;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r {
                    chosen = i;
                    break;
                }
            }
            seeds.push(chosen);
        }

        // Assign each frame to its nearest seed
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_states];
        for r in 0..n_samples {
            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (i, &s) in seeds.iter().enumerate() {
                let dist: f64 = (0..n_features)
                    .map(|d| (x[[r, d]] - x[[s, d]]).powi(2))
                    .sum();
                if dist < best_dist {
                    best_dist = dist;
                    best = i;
                }
            }
            groups[best].push(r);
        }

        let mut means = Array2::zeros((n_states, n_features));
        let mut variances = Array2::from_elem((n_states, n_features), self.var_floor);
        for i in 0..n_states {
            if groups[i].is_empty() {
                // Duplicate seed frames can leave a group empty
                for d in 0..n_features {
                    means[[i, d]] = x[[seeds[i], d]];
                }
                continue;
            }
            let size = groups[i].len() as f64;
            for d in 0..n_features {
                let mean: f64 = groups[i].iter().map(|&r| x[[r, d]]).sum::<f64>() / size;
                let var: f64 = groups[i]
                    .iter()
                    .map(|&r| (x[[r, d]] - mean).powi(2))
                    .sum::<f64>()
                    / size;
                means[[i, d]] = mean;
                variances[[i, d]] = var.max(self.var_floor);
            }
        }

        let initial = Array1::from_elem(n_states, 1.0 / n_states as f64);
        let transition = Array2::from_elem((n_states, n_states), 1.0 / n_states as f64);
        (initial, transition, means, variances)
    }
}

impl ModelFitter for BaumWelchFitter {
    fn fit(&self, item: &ItemData, n_states: usize) -> Result<GaussianHmm> {
        if n_states == 0 {
            return Err(SeqselError::FitError(
                "n_states must be at least 1".to_string(),
            ));
        }
        if item.n_samples() < n_states {
            return Err(SeqselError::FitError(format!(
                "{} states requested but only {} observations available",
                n_states,
                item.n_samples()
            )));
        }

        let n_features = item.n_features();
        let (mut initial, mut transition, mut means, mut variances) =
            self.initialize(item, n_states);
        let mut model = GaussianHmm::new(initial, transition, means, variances)?;

        let mut prev_ll = f64::NEG_INFINITY;
        let mut iterations = 0;
        for iter in 0..self.max_iter {
            iterations = iter + 1;

            let log_pi = model.log_initial();
            let log_a = model.log_transition();

            // E-step accumulators, pooled across sequences
            let mut init_acc = Array1::<f64>::zeros(n_states);
            let mut trans_num = Array2::<f64>::zeros((n_states, n_states));
            let mut trans_den = Array1::<f64>::zeros(n_states);
            let mut occ = Array1::<f64>::zeros(n_states);
            let mut wsum = Array2::<f64>::zeros((n_states, n_features));
            let mut wsq = Array2::<f64>::zeros((n_states, n_features));
            let mut total_ll = 0.0;

            let mut offset = 0;
            for &len in item.lengths() {
                let seq = item.x().slice(s![offset..offset + len, ..]);
                offset += len;

                let log_b = model.emission_log_probs(&seq);
                let (alpha, ll) = forward_log(&log_pi, &log_a, &log_b);
                let beta = backward_log(&log_a, &log_b);
                total_ll += ll;

                for t in 0..len {
                    for i in 0..n_states {
                        let gamma = (alpha[[t, i]] + beta[[t, i]] - ll).exp();
                        occ[i] += gamma;
                        if t == 0 {
                            init_acc[i] += gamma;
                        }
                        if t + 1 < len {
                            trans_den[i] += gamma;
                        }
                        for d in 0..n_features {
                            wsum[[i, d]] += gamma * seq[[t, d]];
                            wsq[[i, d]] += gamma * seq[[t, d]].powi(2);
                        }
                    }
                }
                for t in 0..len.saturating_sub(1) {
                    for i in 0..n_states {
                        for j in 0..n_states {
                            let xi = (alpha[[t, i]]
                                + log_a[[i, j]]
                                + log_b[[t + 1, j]]
                                + beta[[t + 1, j]]
                                - ll)
                                .exp();
                            trans_num[[i, j]] += xi;
                        }
                    }
                }
            }

            if !total_ll.is_finite() {
                return Err(SeqselError::FitError(format!(
                    "log-likelihood diverged at iteration {iter}"
                )));
            }
            if (total_ll - prev_ll).abs() < self.tol {
                break;
            }
            prev_ll = total_ll;

            // M-step
            initial = init_acc.mapv(|v| v + EPSILON);
            let pi_sum = initial.sum();
            initial /= pi_sum;

            transition = Array2::zeros((n_states, n_states));
            for i in 0..n_states {
                if trans_den[i] > EPSILON {
                    for j in 0..n_states {
                        transition[[i, j]] = trans_num[[i, j]] / trans_den[i] + EPSILON;
                    }
                } else {
                    // State unused by any transition, keep it reachable
                    for j in 0..n_states {
                        transition[[i, j]] = 1.0;
                    }
                }
                let row_sum: f64 = transition.row(i).sum();
                for j in 0..n_states {
                    transition[[i, j]] /= row_sum;
                }
            }

            means = model.means().clone();
            variances = model.variances().clone();
            for i in 0..n_states {
                if occ[i] > 1e-8 {
                    for d in 0..n_features {
                        let mean = wsum[[i, d]] / occ[i];
                        let var = wsq[[i, d]] / occ[i] - mean.powi(2);
                        means[[i, d]] = mean;
                        variances[[i, d]] = var.max(self.var_floor);
                    }
                }
            }

            model = GaussianHmm::new(initial, transition, means, variances)?;
        }

        tracing::debug!(
            n_states,
            iterations,
            log_likelihood = prev_ll,
            "baum-welch fit finished"
        );
        Ok(model)
    }
}
