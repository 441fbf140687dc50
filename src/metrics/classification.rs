//! Binary classification metrics.

use serde::{Deserialize, Serialize};

/// Confusion counts and derived scores for the positive class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,

    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Fraction of predictions that are positive.
    pub positive_rate: f64,
}

impl ClassificationMetrics {
    /// Score predicted labels against actual labels, pairwise.
    ///
    /// Extra entries in the longer slice are ignored.
    pub fn from_labels(predicted: &[u8], actual: &[u8]) -> Self {
        let mut metrics = Self::default();
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p == 1, a == 1) {
                (true, true) => metrics.true_positives += 1,
                (true, false) => metrics.false_positives += 1,
                (false, false) => metrics.true_negatives += 1,
                (false, true) => metrics.false_negatives += 1,
            }
        }
        metrics.recompute();
        metrics
    }

    /// Combine counts from another set (e.g. pooling folds) and rescore.
    pub fn merge(&mut self, other: &Self) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.true_negatives += other.true_negatives;
        self.false_negatives += other.false_negatives;
        self.recompute();
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    fn recompute(&mut self) {
        let tp = self.true_positives as f64;
        let fp = self.false_positives as f64;
        let tn = self.true_negatives as f64;
        let fn_ = self.false_negatives as f64;

        self.accuracy = ratio(tp + tn, tp + fp + tn + fn_);
        self.precision = ratio(tp, tp + fp);
        self.recall = ratio(tp, tp + fn_);
        self.f1 = ratio(2.0 * self.precision * self.recall, self.precision + self.recall);
        self.positive_rate = ratio(tp + fp, tp + fp + tn + fn_);
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}
