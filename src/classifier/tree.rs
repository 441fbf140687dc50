//! Binary classification tree (Gini impurity).
//!
//! Grown on an index list so bootstrap samples never copy feature rows.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::data::{FeatureRow, N_FEATURES};

/// Tree growth limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of the tree.
    pub max_depth: usize,
    /// Minimum samples required to split a node.
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Features sampled per split.
    pub max_features: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: N_FEATURES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        /// Fraction of class-1 samples that reached this leaf.
        p_positive: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn depth(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// A single fitted classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self { config, root: None }
    }

    /// Grow the tree on `indices` (duplicates allowed, as in a bootstrap sample).
    pub fn fit(&mut self, features: &[FeatureRow], labels: &[u8], indices: &[usize], rng: &mut ChaCha8Rng) {
        self.root = Some(self.build(features, labels, indices.to_vec(), 0, rng));
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Depth of the fitted tree (0 if unfitted).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map(Node::depth).unwrap_or(0)
    }

    /// Class-1 probability for one row. Unfitted trees return 0.5.
    pub fn predict_proba_one(&self, row: &FeatureRow) -> f64 {
        let mut node = match &self.root {
            Some(node) => node,
            None => return 0.5,
        };
        loop {
            match node {
                Node::Leaf { p_positive } => return *p_positive,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left.as_ref() } else { right.as_ref() };
                }
            }
        }
    }

    fn build(
        &self,
        features: &[FeatureRow],
        labels: &[u8],
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> Node {
        let n = indices.len();
        let positives = indices.iter().filter(|&&i| labels[i] == 1).count();
        let p_positive = if n == 0 { 0.5 } else { positives as f64 / n as f64 };

        if depth >= self.config.max_depth
            || n < self.config.min_samples_split.max(2)
            || positives == 0
            || positives == n
        {
            return Node::Leaf { p_positive };
        }

        let Some(split) = self.best_split(features, labels, &indices, positives, rng) else {
            return Node::Leaf { p_positive };
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| features[i][split.feature] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(features, labels, left_idx, depth + 1, rng)),
            right: Box::new(self.build(features, labels, right_idx, depth + 1, rng)),
        }
    }

    /// Sorted sweep over each sampled feature; O(n log n) per feature.
    fn best_split(
        &self,
        features: &[FeatureRow],
        labels: &[u8],
        indices: &[usize],
        positives: usize,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let parent = gini(positives, n);

        let mut candidates: Vec<usize> = (0..N_FEATURES).collect();
        candidates.shuffle(rng);
        candidates.truncate(self.config.max_features.clamp(1, N_FEATURES));

        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, u8)> = Vec::with_capacity(n);

        for feature in candidates {
            column.clear();
            column.extend(indices.iter().map(|&i| (features[i][feature], labels[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0usize;
            for split_at in 1..n {
                left_pos += column[split_at - 1].1 as usize;
                let (lo, hi) = (column[split_at - 1].0, column[split_at].0);
                if lo == hi {
                    continue;
                }
                let right_n = n - split_at;
                if split_at < min_leaf || right_n < min_leaf {
                    continue;
                }

                let weighted = (split_at as f64 * gini(left_pos, split_at)
                    + right_n as f64 * gini(positives - left_pos, right_n))
                    / n as f64;
                let gain = parent - weighted;

                if gain > best.as_ref().map(|b| b.gain).unwrap_or(1e-12) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(lo, hi),
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Split point strictly below `hi`, so `hi` always goes right.
///
/// Halving first keeps extreme values (e.g. +/-1e308) finite.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo / 2.0 + hi / 2.0;
    if mid < lo || mid >= hi {
        lo
    } else {
        mid
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}
