//! seqsel - per-word sequence-model selection and recognition
//!
//! This crate selects, for each vocabulary word in a sequence-classification
//! task, the best-fitting hidden-state count for a per-word Gaussian HMM, then
//! uses the resulting set of models to classify unseen sequences.
//!
//! # Modules
//!
//! - [`dataset`] - Per-word observation sequences and recombination helpers
//! - [`hmm`] - Diagonal-covariance Gaussian HMM with Baum-Welch training
//! - [`selection`] - Model selection strategies (Constant, BIC, DIC, CV)
//! - [`recognition`] - Scoring unseen sequences against a trained model set

// Core error handling
pub mod error;

// Core modules
pub mod dataset;
pub mod hmm;
pub mod selection;
pub mod recognition;

pub use error::{Result, SeqselError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, SeqselError};

    // Data
    pub use crate::dataset::{Dataset, ItemData};

    // Models and fitting
    pub use crate::hmm::{BaumWelchFitter, GaussianHmm, ModelFitter};

    // Selection
    pub use crate::selection::{ModelSelector, SelectionCriterion, SelectorConfig};

    // Recognition
    pub use crate::recognition::{recognize, RecognitionOutput, WordModels};
}
