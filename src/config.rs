//! Run configuration.
//!
//! Loaded from TOML; every key is optional and falls back to the defaults
//! below. CLI flags are applied on top by the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::ForestConfig;

/// Slack for ratio sums such as `0.7 + 0.3` that land a hair above 1.0.
pub(crate) const RATIO_EPSILON: f64 = 1e-9;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Ensemble learner settings, identical for every fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Seed shared by every fold's learner.
    pub seed: u64,
    /// Ensemble member count.
    pub size: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled per split; `None` uses ceil(sqrt(12)).
    pub max_features: Option<usize>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            size: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

impl ClassifierConfig {
    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.size,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            bootstrap: true,
            seed: self.seed,
        }
    }
}

/// Walk-forward evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Fraction of the dataset used for each fold's train window.
    pub train_ratio: f64,
    /// Fraction of the dataset used for each fold's test window (and the roll step).
    pub test_ratio: f64,
    /// A row is predicted positive iff its probability is strictly above this.
    pub decision_threshold: f64,
    /// Run folds on the rayon pool instead of one after another.
    pub parallel: bool,
    pub classifier: ClassifierConfig,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.6,
            test_ratio: 0.2,
            decision_threshold: 0.5,
            parallel: false,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl WalkForwardConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check ratio bounds, threshold range and ensemble size.
    ///
    /// Dataset-dependent checks (a zero-length test window) happen when the
    /// schedule is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ratios(self.train_ratio, self.test_ratio)?;
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(ConfigError::Invalid(format!(
                "decision_threshold must be in [0, 1], got {}",
                self.decision_threshold
            )));
        }
        if self.classifier.size == 0 {
            return Err(ConfigError::Invalid("classifier.size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Both ratios finite and positive, summing to at most 1.
///
/// Shared by [`WalkForwardConfig::validate`] and the window scheduler.
pub(crate) fn validate_ratios(train_ratio: f64, test_ratio: f64) -> Result<(), ConfigError> {
    for (name, value) in [("train_ratio", train_ratio), ("test_ratio", test_ratio)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, value)));
        }
    }
    if train_ratio + test_ratio > 1.0 + RATIO_EPSILON {
        return Err(ConfigError::Invalid(format!(
            "train_ratio + test_ratio must be <= 1, got {}",
            train_ratio + test_ratio
        )));
    }
    Ok(())
}
