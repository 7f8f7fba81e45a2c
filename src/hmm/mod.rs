//! Diagonal-covariance Gaussian Hidden Markov Models
//!
//! All likelihood computations run in log-space to avoid numerical underflow
//! on long observation sequences.

mod train;

pub use train::{BaumWelchFitter, ModelFitter};

use crate::error::{Result, SeqselError};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Added before taking logs of probabilities to avoid log(0).
pub(crate) const EPSILON: f64 = 1e-10;

/// Numerically stable computation of `log(exp(a) + exp(b))`.
pub(crate) fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// Log-sum-exp over a slice.
pub(crate) fn log_sum_exp_slice(xs: &[f64]) -> f64 {
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// A trained Gaussian HMM with diagonal covariance.
///
/// Parameters are stored in probability space; scoring operates in log-space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianHmm {
    /// Initial state probabilities, length `n_states`.
    initial: Array1<f64>,
    /// Transition matrix, `n_states` x `n_states`, rows sum to 1.
    transition: Array2<f64>,
    /// Per-state emission means, `n_states` x `n_features`.
    means: Array2<f64>,
    /// Per-state diagonal emission variances, `n_states` x `n_features`.
    variances: Array2<f64>,
}

impl GaussianHmm {
    /// Create a model after validating dimensions and probability constraints.
    pub fn new(
        initial: Array1<f64>,
        transition: Array2<f64>,
        means: Array2<f64>,
        variances: Array2<f64>,
    ) -> Result<Self> {
        let n_states = initial.len();
        if n_states == 0 {
            return Err(SeqselError::ValidationError(
                "model must have at least one state".to_string(),
            ));
        }
        if transition.dim() != (n_states, n_states) {
            return Err(SeqselError::ValidationError(format!(
                "transition matrix is {:?}, expected ({n}, {n})",
                transition.dim(),
                n = n_states
            )));
        }
        if means.dim() != variances.dim() || means.nrows() != n_states {
            return Err(SeqselError::ValidationError(format!(
                "means {:?} and variances {:?} must both be ({}, n_features)",
                means.dim(),
                variances.dim(),
                n_states
            )));
        }
        if means.ncols() == 0 {
            return Err(SeqselError::ValidationError(
                "model must have at least one feature".to_string(),
            ));
        }

        let tol = 1e-6;
        let pi_sum: f64 = initial.sum();
        if (pi_sum - 1.0).abs() > tol {
            return Err(SeqselError::ValidationError(format!(
                "initial probabilities sum to {pi_sum}, expected ~1.0"
            )));
        }
        for (i, row) in transition.rows().into_iter().enumerate() {
            let row_sum: f64 = row.sum();
            if (row_sum - 1.0).abs() > tol {
                return Err(SeqselError::ValidationError(format!(
                    "transition row {i} sums to {row_sum}, expected ~1.0"
                )));
            }
        }
        if variances.iter().any(|&v| v <= 0.0 || !v.is_finite()) {
            return Err(SeqselError::ValidationError(
                "variances must be positive and finite".to_string(),
            ));
        }

        Ok(Self {
            initial,
            transition,
            means,
            variances,
        })
    }

    /// Number of hidden states.
    pub fn n_states(&self) -> usize {
        self.initial.len()
    }

    /// Observation dimensionality.
    pub fn n_features(&self) -> usize {
        self.means.ncols()
    }

    pub fn initial(&self) -> &Array1<f64> {
        &self.initial
    }

    pub fn transition(&self) -> &Array2<f64> {
        &self.transition
    }

    pub fn means(&self) -> &Array2<f64> {
        &self.means
    }

    pub fn variances(&self) -> &Array2<f64> {
        &self.variances
    }

    pub(crate) fn log_initial(&self) -> Array1<f64> {
        self.initial.mapv(|p| (p + EPSILON).ln())
    }

    pub(crate) fn log_transition(&self) -> Array2<f64> {
        self.transition.mapv(|p| (p + EPSILON).ln())
    }

    /// Per-observation emission log-densities, `T` x `n_states`.
    pub(crate) fn emission_log_probs(&self, seq: &ArrayView2<f64>) -> Array2<f64> {
        let t_len = seq.nrows();
        let n = self.n_states();
        let mut log_b = Array2::zeros((t_len, n));
        for (t, obs) in seq.rows().into_iter().enumerate() {
            for i in 0..n {
                // Diagonal Gaussian log-density
                let ll: f64 = obs
                    .iter()
                    .zip(self.means.row(i).iter())
                    .zip(self.variances.row(i).iter())
                    .map(|((&x, &mean), &var)| {
                        -0.5 * ((x - mean).powi(2) / var + var.ln() + (2.0 * PI).ln())
                    })
                    .sum();
                log_b[[t, i]] = ll;
            }
        }
        log_b
    }

    /// Total log-likelihood of stacked observations under this model.
    ///
    /// The matrix is split back into sequences via `lengths`; each sequence is
    /// scored with a log-space forward pass and the results are summed.
    pub fn log_likelihood(&self, x: &Array2<f64>, lengths: &[usize]) -> Result<f64> {
        self.validate_observations(x, lengths)?;

        let log_pi = self.log_initial();
        let log_a = self.log_transition();

        let mut total = 0.0;
        let mut offset = 0;
        for &len in lengths {
            let seq = x.slice(ndarray::s![offset..offset + len, ..]);
            let log_b = self.emission_log_probs(&seq);
            let (_, ll) = forward_log(&log_pi, &log_a, &log_b);
            total += ll;
            offset += len;
        }

        if !total.is_finite() {
            return Err(SeqselError::ScoreError(format!(
                "log-likelihood is not finite ({total})"
            )));
        }
        Ok(total)
    }

    fn validate_observations(&self, x: &Array2<f64>, lengths: &[usize]) -> Result<()> {
        if x.ncols() != self.n_features() {
            return Err(SeqselError::ScoreError(format!(
                "observations have {} features, model expects {}",
                x.ncols(),
                self.n_features()
            )));
        }
        if lengths.is_empty() || lengths.iter().any(|&l| l == 0) {
            return Err(SeqselError::ScoreError(
                "lengths must be non-empty and positive".to_string(),
            ));
        }
        let total: usize = lengths.iter().sum();
        if total != x.nrows() {
            return Err(SeqselError::ScoreError(format!(
                "lengths sum to {}, but matrix has {} rows",
                total,
                x.nrows()
            )));
        }
        Ok(())
    }
}

/// Log-space forward pass over one sequence.
///
/// Returns `(alpha, log_likelihood)` where `alpha[t][i]` is the log
/// probability of the first `t + 1` observations ending in state `i`.
pub(crate) fn forward_log(
    log_pi: &Array1<f64>,
    log_a: &Array2<f64>,
    log_b: &Array2<f64>,
) -> (Array2<f64>, f64) {
    let t_len = log_b.nrows();
    let n = log_pi.len();
    let mut alpha = Array2::from_elem((t_len, n), f64::NEG_INFINITY);

    for i in 0..n {
        alpha[[0, i]] = log_pi[i] + log_b[[0, i]];
    }
    for t in 1..t_len {
        for j in 0..n {
            let mut acc = f64::NEG_INFINITY;
            for i in 0..n {
                acc = log_sum_exp(acc, alpha[[t - 1, i]] + log_a[[i, j]]);
            }
            alpha[[t, j]] = acc + log_b[[t, j]];
        }
    }

    let last: Vec<f64> = alpha.row(t_len - 1).to_vec();
    let ll = log_sum_exp_slice(&last);
    (alpha, ll)
}

/// Log-space backward pass over one sequence.
///
/// Returns `beta` where `beta[t][i]` is the log probability of the
/// observations after time `t` given state `i` at time `t`.
pub(crate) fn backward_log(log_a: &Array2<f64>, log_b: &Array2<f64>) -> Array2<f64> {
    let t_len = log_b.nrows();
    let n = log_a.nrows();
    let mut beta = Array2::from_elem((t_len, n), f64::NEG_INFINITY);

    for i in 0..n {
        beta[[t_len - 1, i]] = 0.0;
    }
    for t in (0..t_len - 1).rev() {
        for i in 0..n {
            let mut acc = f64::NEG_INFINITY;
            for j in 0..n {
                acc = log_sum_exp(acc, log_a[[i, j]] + log_b[[t + 1, j]] + beta[[t + 1, j]]);
            }
            beta[[t, i]] = acc;
        }
    }
    beta
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn single_state_model() -> GaussianHmm {
        GaussianHmm::new(
            array![1.0],
            array![[1.0]],
            array![[0.0, 1.0]],
            array![[1.0, 2.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_log_sum_exp_stability() {
        let r = log_sum_exp(-1000.0, -1001.0);
        assert!(r.is_finite());
        assert!(r >= -1000.0 && r < -999.0);

        assert!((log_sum_exp(0.0, 0.0) - 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(log_sum_exp(f64::NEG_INFINITY, 5.0), 5.0);
        assert_eq!(log_sum_exp_slice(&[f64::NEG_INFINITY; 3]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_single_state_matches_gaussian_density() {
        // With one state the forward pass degenerates to a sum of per-frame
        // Gaussian log-densities.
        let model = single_state_model();
        let x = array![[0.5, 1.5], [-0.5, 0.0]];
        let ll = model.log_likelihood(&x, &[2]).unwrap();

        let mut expected = 0.0;
        for row in x.rows() {
            expected += -0.5 * ((row[0] - 0.0f64).powi(2) / 1.0 + 1.0f64.ln() + (2.0 * PI).ln());
            expected += -0.5 * ((row[1] - 1.0f64).powi(2) / 2.0 + 2.0f64.ln() + (2.0 * PI).ln());
        }
        assert!(
            (ll - expected).abs() < 1e-6,
            "forward LL ({ll}) should match direct density sum ({expected})"
        );
    }

    #[test]
    fn test_multi_sequence_score_is_sum_of_parts() {
        let model = single_state_model();
        let x = array![[0.5, 1.5], [-0.5, 0.0], [1.0, 1.0]];
        let whole = model.log_likelihood(&x, &[2, 1]).unwrap();

        let first = model
            .log_likelihood(&x.slice(ndarray::s![..2, ..]).to_owned(), &[2])
            .unwrap();
        let second = model
            .log_likelihood(&x.slice(ndarray::s![2.., ..]).to_owned(), &[1])
            .unwrap();
        assert!((whole - (first + second)).abs() < 1e-9);
    }

    #[test]
    fn test_score_rejects_mismatched_shapes() {
        let model = single_state_model();
        // Wrong feature count
        assert!(model.log_likelihood(&array![[1.0]], &[1]).is_err());
        // Lengths do not cover the matrix
        assert!(model.log_likelihood(&array![[1.0, 2.0]], &[2]).is_err());
        // Zero-length sequence
        assert!(model.log_likelihood(&array![[1.0, 2.0]], &[1, 0]).is_err());
    }

    #[test]
    fn test_new_rejects_invalid_parameters() {
        // Initial probabilities do not sum to 1
        assert!(GaussianHmm::new(
            array![0.4, 0.4],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[0.0], [1.0]],
            array![[1.0], [1.0]],
        )
        .is_err());
        // Non-stochastic transition row
        assert!(GaussianHmm::new(
            array![0.5, 0.5],
            array![[0.9, 0.9], [0.5, 0.5]],
            array![[0.0], [1.0]],
            array![[1.0], [1.0]],
        )
        .is_err());
        // Non-positive variance
        assert!(GaussianHmm::new(
            array![1.0],
            array![[1.0]],
            array![[0.0]],
            array![[0.0]],
        )
        .is_err());
    }

    #[test]
    fn test_forward_backward_consistency() {
        let model = GaussianHmm::new(
            array![0.6, 0.4],
            array![[0.7, 0.3], [0.4, 0.6]],
            array![[0.0, 0.0], [3.0, 3.0]],
            array![[1.0, 1.0], [1.0, 1.0]],
        )
        .unwrap();
        let x = array![[0.1, -0.2], [2.8, 3.1], [0.0, 0.3], [3.2, 2.9]];

        let log_pi = model.log_initial();
        let log_a = model.log_transition();
        let log_b = model.emission_log_probs(&x.view());

        let (alpha, ll_fwd) = forward_log(&log_pi, &log_a, &log_b);
        let beta = backward_log(&log_a, &log_b);

        let terms: Vec<f64> = (0..model.n_states())
            .map(|i| alpha[[0, i]] + beta[[0, i]])
            .collect();
        let ll_from_ab = log_sum_exp_slice(&terms);
        assert!(
            (ll_fwd - ll_from_ab).abs() < 1e-6,
            "forward LL ({ll_fwd}) and alpha+beta LL ({ll_from_ab}) should match"
        );
    }
}
