//! Pluggable binary classifier capability.
//!
//! The walk-forward engine only depends on [`Classifier`] and
//! [`ClassifierFactory`]. A factory is invoked once per fold so that no learner
//! state survives from one fold to the next.

pub mod forest;
pub mod tree;

use thiserror::Error;

use crate::data::FeatureRow;

pub use forest::{ForestConfig, ForestFactory, RandomForestClassifier};
pub use tree::{DecisionTree, TreeConfig};

/// Why a classifier could not be fitted or scored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Empty training set")]
    EmptyTrainingSet,

    #[error("Training labels contain a single class ({class})")]
    SingleClass { class: u8 },

    #[error("Shape mismatch: {rows} feature rows, {labels} labels")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("Classifier used before fit")]
    NotFitted,

    #[error("Degenerate input: {0}")]
    Degenerate(String),
}

/// Binary classifier with a fit / predict-probability contract.
pub trait Classifier {
    /// Fit on feature rows and 0/1 labels.
    fn fit(&mut self, features: &[FeatureRow], labels: &[u8]) -> Result<(), FitError>;

    /// Probability of class 1 for each row.
    fn predict_proba(&self, features: &[FeatureRow]) -> Result<Vec<f64>, FitError>;
}

/// Produces fresh, identically-configured classifier instances.
pub trait ClassifierFactory: Sync {
    type Model: Classifier + Send;

    fn create(&self) -> Self::Model;
}

impl<F, C> ClassifierFactory for F
where
    F: Fn() -> C + Sync,
    C: Classifier + Send,
{
    type Model = C;

    fn create(&self) -> C {
        self()
    }
}

/// Shared training-input checks for classifier implementations.
pub fn check_training_set(features: &[FeatureRow], labels: &[u8]) -> Result<(), FitError> {
    if features.len() != labels.len() {
        return Err(FitError::ShapeMismatch {
            rows: features.len(),
            labels: labels.len(),
        });
    }
    let Some(&first) = labels.first() else {
        return Err(FitError::EmptyTrainingSet);
    };
    if let Some(bad) = labels.iter().find(|&&l| l > 1) {
        return Err(FitError::Degenerate(format!("label {} is not binary", bad)));
    }
    if labels.iter().all(|&l| l == first) {
        return Err(FitError::SingleClass { class: first });
    }
    if let Some(idx) = features.iter().position(|row| row.iter().any(|v| !v.is_finite())) {
        return Err(FitError::Degenerate(format!("non-finite feature value in row {}", idx)));
    }
    Ok(())
}
