//! Seeded random-forest classifier.
//!
//! Each tree is grown on a bootstrap sample drawn from its own ChaCha8 stream
//! seeded by `seed + tree_index`, so two forests with the same config fitted
//! on the same data are identical regardless of thread scheduling.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeConfig};
use super::{check_training_set, Classifier, ClassifierFactory, FitError};
use crate::data::{FeatureRow, N_FEATURES};

/// Random forest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest.
    pub n_trees: usize,
    /// Maximum depth of each tree.
    pub max_depth: usize,
    /// Minimum samples to split.
    pub min_samples_split: usize,
    /// Minimum samples in leaf.
    pub min_samples_leaf: usize,
    /// Features per split (ceil(sqrt(12)) if None).
    pub max_features: Option<usize>,
    /// Bootstrap sampling.
    pub bootstrap: bool,
    /// Random seed.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self
                .max_features
                .unwrap_or_else(|| (N_FEATURES as f64).sqrt().ceil() as usize),
        }
    }
}

/// Bagged ensemble of Gini trees; probability is the mean leaf frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, features: &[FeatureRow], labels: &[u8]) -> Result<(), FitError> {
        check_training_set(features, labels)?;
        if self.config.n_trees == 0 {
            return Err(FitError::Degenerate("forest configured with zero trees".to_string()));
        }

        let n = features.len();
        let tree_config = self.config.tree_config();
        let seed = self.config.seed;
        let bootstrap = self.config.bootstrap;

        self.trees = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                let indices: Vec<usize> = if bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };

                let mut tree = DecisionTree::new(tree_config.clone());
                tree.fit(features, labels, &indices, &mut rng);
                tree
            })
            .collect();

        Ok(())
    }

    fn predict_proba(&self, features: &[FeatureRow]) -> Result<Vec<f64>, FitError> {
        if self.trees.is_empty() {
            return Err(FitError::NotFitted);
        }
        let n_trees = self.trees.len() as f64;
        Ok(features
            .iter()
            .map(|row| self.trees.iter().map(|t| t.predict_proba_one(row)).sum::<f64>() / n_trees)
            .collect())
    }
}

/// Builds identically-configured forests, one per fold.
#[derive(Debug, Clone, Default)]
pub struct ForestFactory {
    config: ForestConfig,
}

impl ForestFactory {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }
}

impl ClassifierFactory for ForestFactory {
    type Model = RandomForestClassifier;

    fn create(&self) -> RandomForestClassifier {
        RandomForestClassifier::new(self.config.clone())
    }
}
