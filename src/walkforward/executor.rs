//! Fold execution.
//!
//! Fits a freshly created classifier on one window's train rows and scores
//! that window's test rows. The classifier only ever receives the two
//! slices, never the full matrix, so it cannot observe later rows.

use tracing::{debug, warn};

use crate::classifier::{Classifier, ClassifierFactory, FitError};
use crate::data::{FeatureMatrix, FeatureRow, Timestamp};

use super::windows::Window;
use super::WalkForwardError;

/// Thresholded labels and raw probabilities for one fold's test rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldPredictions {
    pub predicted_labels: Vec<u8>,
    pub probabilities: Vec<f64>,
}

impl FoldPredictions {
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.predicted_labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Result of one fold: scored, or skipped because the learner failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FoldOutcome {
    Succeeded {
        window: Window,
        timestamps: Vec<Timestamp>,
        /// Recorded labels of the test rows, used for scoring only.
        actual_labels: Vec<u8>,
        predictions: FoldPredictions,
    },
    Failed {
        window: Window,
        error: FitError,
    },
}

impl FoldOutcome {
    pub fn window(&self) -> &Window {
        match self {
            Self::Succeeded { window, .. } | Self::Failed { window, .. } => window,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Runs folds with one fresh classifier per call.
pub struct FoldExecutor<'a, F: ClassifierFactory> {
    factory: &'a F,
    decision_threshold: f64,
}

impl<'a, F: ClassifierFactory> FoldExecutor<'a, F> {
    pub fn new(factory: &'a F, decision_threshold: f64) -> Self {
        Self {
            factory,
            decision_threshold,
        }
    }

    /// Fit on the train slice, score the test slice.
    ///
    /// The classifier is created here and dropped on return, so at most one
    /// instance per fold is ever alive.
    pub fn run_fold(
        &self,
        train_features: &[FeatureRow],
        train_labels: &[u8],
        test_features: &[FeatureRow],
    ) -> Result<FoldPredictions, FitError> {
        let mut model = self.factory.create();
        model.fit(train_features, train_labels)?;
        let probabilities = model.predict_proba(test_features)?;

        let predicted_labels = probabilities
            .iter()
            .map(|&p| u8::from(p > self.decision_threshold))
            .collect();

        Ok(FoldPredictions {
            predicted_labels,
            probabilities,
        })
    }

    /// Run the fold for `window` against `matrix`.
    ///
    /// Learner failures become [`FoldOutcome::Failed`]. Malformed learner
    /// output (wrong length, probability outside [0, 1]) is a defect and
    /// aborts the run.
    pub fn execute(&self, matrix: &FeatureMatrix, window: &Window) -> Result<FoldOutcome, WalkForwardError> {
        if window.train.end != window.test.start {
            return Err(WalkForwardError::Invariant(format!(
                "fold {}: train {:?} does not end where test {:?} starts",
                window.fold, window.train, window.test
            )));
        }

        let train = matrix.slice(window.train.clone())?;
        let test = matrix.slice(window.test.clone())?;

        debug!(
            "Fold {}: fitting on {} rows ({} positive), scoring {} rows",
            window.fold,
            train.len(),
            train.labels.iter().filter(|&&l| l == 1).count(),
            test.len()
        );

        let predictions = match self.run_fold(train.rows, train.labels, test.rows) {
            Ok(predictions) => predictions,
            Err(error) => {
                warn!("Fold {} skipped: {}", window.fold, error);
                return Ok(FoldOutcome::Failed {
                    window: window.clone(),
                    error,
                });
            }
        };

        if predictions.len() != test.len() {
            return Err(WalkForwardError::Invariant(format!(
                "fold {}: classifier returned {} probabilities for {} test rows",
                window.fold,
                predictions.len(),
                test.len()
            )));
        }
        if let Some(bad) = predictions.probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(WalkForwardError::Invariant(format!(
                "fold {}: probability {} outside [0, 1]",
                window.fold, bad
            )));
        }

        Ok(FoldOutcome::Succeeded {
            window: window.clone(),
            timestamps: test.timestamps.to_vec(),
            actual_labels: test.labels.to_vec(),
            predictions,
        })
    }
}
