//! Prediction aggregation.
//!
//! Concatenates per-fold predictions in fold order and accounts for every
//! row that did not get a prediction.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{Prediction, Timestamp};
use crate::metrics::ClassificationMetrics;

use super::executor::FoldOutcome;
use super::windows::WindowSchedule;
use super::WalkForwardError;

/// Whether a fold contributed predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FoldStatus {
    Succeeded,
    Skipped { reason: String },
}

/// Per-fold statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldSummary {
    pub fold: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
    #[serde(flatten)]
    pub status: FoldStatus,
    pub predictions: usize,
    pub positives: usize,
    pub metrics: Option<ClassificationMetrics>,
}

/// Complete walk-forward run result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    /// Out-of-sample predictions in fold (chronological) order.
    pub predictions: Vec<Prediction>,
    pub folds: Vec<FoldSummary>,
    pub n_rows: usize,
    pub total_predictions: usize,
    /// Rows before the first test range (train-only).
    pub leading_rows: usize,
    /// Rows after the last test range: no signal.
    pub tail_rows: usize,
    /// Every row without a prediction, including rows of skipped folds.
    pub unscored_rows: usize,
    pub succeeded_folds: usize,
    pub skipped_folds: usize,
    /// Pooled metrics over all scored rows (None when nothing was scored).
    pub metrics: Option<ClassificationMetrics>,
}

impl WalkForwardReport {
    pub fn total_folds(&self) -> usize {
        self.folds.len()
    }

    pub fn positive_predictions(&self) -> usize {
        self.folds.iter().map(|f| f.positives).sum()
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Walk-Forward Results: {} folds ({} succeeded, {} skipped)\n\
             Rows: {}\n\
             Out-of-sample predictions: {} ({} positive)\n\
             Rows with no signal: {} ({} leading train-only, {} tail)",
            self.total_folds(),
            self.succeeded_folds,
            self.skipped_folds,
            self.n_rows,
            self.total_predictions,
            self.positive_predictions(),
            self.unscored_rows,
            self.leading_rows,
            self.tail_rows,
        );
        if let Some(m) = &self.metrics {
            out.push_str(&format!(
                "\nAccuracy: {:.3}  Precision: {:.3}  Recall: {:.3}  F1: {:.3}",
                m.accuracy, m.precision, m.recall, m.f1
            ));
        }
        out
    }
}

/// Merges fold outcomes into one ordered prediction list.
pub struct PredictionAggregator<'a> {
    schedule: &'a WindowSchedule,
}

impl<'a> PredictionAggregator<'a> {
    pub fn new(schedule: &'a WindowSchedule) -> Self {
        Self { schedule }
    }

    /// Concatenate outcomes in fold order.
    ///
    /// Nothing is deduplicated: an outcome whose window differs from the
    /// scheduled one, overlapping test ranges or a repeated timestamp mean the
    /// schedule or the input is broken, and are returned as
    /// [`WalkForwardError::Invariant`].
    pub fn aggregate(&self, mut outcomes: Vec<FoldOutcome>) -> Result<WalkForwardReport, WalkForwardError> {
        if outcomes.len() != self.schedule.len() {
            return Err(WalkForwardError::Invariant(format!(
                "{} fold outcomes for {} scheduled windows",
                outcomes.len(),
                self.schedule.len()
            )));
        }
        outcomes.sort_by_key(|o| o.window().fold);

        let mut predictions: Vec<Prediction> = Vec::with_capacity(self.schedule.covered_rows());
        let mut folds: Vec<FoldSummary> = Vec::with_capacity(outcomes.len());
        let mut pooled: Option<ClassificationMetrics> = None;
        let mut seen: HashSet<Timestamp> = HashSet::new();
        let mut prev_test_end = 0;
        let mut out_of_order = 0usize;

        for (outcome, scheduled) in outcomes.into_iter().zip(self.schedule.windows()) {
            let window = outcome.window().clone();
            if &window != scheduled {
                return Err(WalkForwardError::Invariant(format!(
                    "fold {} ran on train {:?} test {:?}, scheduled train {:?} test {:?}",
                    window.fold, window.train, window.test, scheduled.train, scheduled.test
                )));
            }
            if window.test.start < prev_test_end {
                return Err(WalkForwardError::Invariant(format!(
                    "fold {} test range {:?} overlaps an earlier fold",
                    window.fold, window.test
                )));
            }
            prev_test_end = window.test.end;

            match outcome {
                FoldOutcome::Succeeded {
                    window,
                    timestamps,
                    actual_labels,
                    predictions: fold,
                } => {
                    if timestamps.len() != window.test_len()
                        || fold.len() != window.test_len()
                        || fold.predicted_labels.len() != window.test_len()
                    {
                        return Err(WalkForwardError::Invariant(format!(
                            "fold {}: {} test rows but {} timestamps, {} labels, {} probabilities",
                            window.fold,
                            window.test_len(),
                            timestamps.len(),
                            fold.predicted_labels.len(),
                            fold.len()
                        )));
                    }

                    let metrics = ClassificationMetrics::from_labels(&fold.predicted_labels, &actual_labels);
                    match pooled.as_mut() {
                        Some(p) => p.merge(&metrics),
                        None => pooled = Some(metrics.clone()),
                    }

                    for ((timestamp, predicted_label), probability) in timestamps
                        .into_iter()
                        .zip(fold.predicted_labels.iter().copied())
                        .zip(fold.probabilities.iter().copied())
                    {
                        if let Some(last) = predictions.last() {
                            if timestamp < last.timestamp {
                                out_of_order += 1;
                            }
                        }
                        if !seen.insert(timestamp.clone()) {
                            return Err(WalkForwardError::Invariant(format!(
                                "timestamp {} predicted more than once (fold {})",
                                timestamp, window.fold
                            )));
                        }
                        predictions.push(Prediction {
                            timestamp,
                            predicted_label,
                            probability,
                        });
                    }

                    folds.push(FoldSummary {
                        fold: window.fold,
                        train: window.train,
                        test: window.test,
                        status: FoldStatus::Succeeded,
                        predictions: fold.len(),
                        positives: fold.positives(),
                        metrics: Some(metrics),
                    });
                }
                FoldOutcome::Failed { window, error } => {
                    folds.push(FoldSummary {
                        fold: window.fold,
                        train: window.train,
                        test: window.test,
                        status: FoldStatus::Skipped {
                            reason: error.to_string(),
                        },
                        predictions: 0,
                        positives: 0,
                        metrics: None,
                    });
                }
            }
        }

        if out_of_order > 0 {
            warn!(
                "{} predictions are out of timestamp order; input records were not chronological",
                out_of_order
            );
        }

        let succeeded_folds = folds.iter().filter(|f| f.status == FoldStatus::Succeeded).count();
        let total_predictions = predictions.len();
        let unscored_rows = self
            .schedule
            .n_rows()
            .checked_sub(total_predictions)
            .ok_or_else(|| {
                WalkForwardError::Invariant(format!(
                    "{} predictions for {} rows",
                    total_predictions,
                    self.schedule.n_rows()
                ))
            })?;

        Ok(WalkForwardReport {
            predictions,
            n_rows: self.schedule.n_rows(),
            total_predictions,
            leading_rows: self.schedule.leading_rows(),
            tail_rows: self.schedule.tail_rows(),
            unscored_rows,
            succeeded_folds,
            skipped_folds: folds.len() - succeeded_folds,
            folds,
            metrics: pooled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FitError;
    use crate::walkforward::executor::FoldPredictions;
    use crate::walkforward::windows::Window;

    fn succeeded(window: &Window, probabilities: Vec<f64>) -> FoldOutcome {
        FoldOutcome::Succeeded {
            window: window.clone(),
            timestamps: window.test.clone().map(|i| Timestamp::Millis(i as i64)).collect(),
            actual_labels: vec![1; window.test_len()],
            predictions: FoldPredictions {
                predicted_labels: probabilities.iter().map(|&p| u8::from(p > 0.5)).collect(),
                probabilities,
            },
        }
    }

    #[test]
    fn test_aggregate_in_fold_order() {
        let schedule = WindowSchedule::new(10, 0.6, 0.2).unwrap();
        let windows = schedule.windows();
        // Outcomes arrive out of order (e.g. from a parallel run).
        let outcomes = vec![
            succeeded(&windows[1], vec![0.2, 0.9]),
            succeeded(&windows[0], vec![0.7, 0.6]),
        ];

        let report = PredictionAggregator::new(&schedule).aggregate(outcomes).unwrap();

        assert_eq!(report.total_predictions, 4);
        assert_eq!(report.succeeded_folds, 2);
        assert_eq!(report.skipped_folds, 0);
        assert_eq!(report.tail_rows, 0);
        assert_eq!(report.leading_rows, 6);
        assert_eq!(report.unscored_rows, 6);
        let stamps: Vec<_> = report.predictions.iter().map(|p| p.timestamp.clone()).collect();
        assert_eq!(
            stamps,
            (6..10).map(Timestamp::Millis).collect::<Vec<_>>()
        );
        assert_eq!(report.folds[0].positives, 2);
        assert_eq!(report.folds[1].positives, 1);
        assert_eq!(report.positive_predictions(), 3);
        assert_eq!(report.metrics.as_ref().unwrap().true_positives, 3);
    }

    #[test]
    fn test_failed_fold_excluded() {
        let schedule = WindowSchedule::new(11, 0.6, 0.2).unwrap();
        let windows = schedule.windows();
        let outcomes = vec![
            FoldOutcome::Failed {
                window: windows[0].clone(),
                error: FitError::SingleClass { class: 0 },
            },
            succeeded(&windows[1], vec![0.9, 0.8]),
        ];

        let report = PredictionAggregator::new(&schedule).aggregate(outcomes).unwrap();

        assert_eq!(report.total_predictions, 2);
        assert_eq!(report.succeeded_folds, 1);
        assert_eq!(report.skipped_folds, 1);
        assert_eq!(report.tail_rows, 1);
        assert_eq!(report.unscored_rows, 9);
        assert!(matches!(report.folds[0].status, FoldStatus::Skipped { .. }));
        assert!(report.folds[0].metrics.is_none());
        assert!(report.summary().contains("1 skipped"));
    }

    #[test]
    fn test_duplicate_timestamp_is_invariant_violation() {
        let schedule = WindowSchedule::new(10, 0.6, 0.2).unwrap();
        let windows = schedule.windows();
        let mut second = succeeded(&windows[1], vec![0.1, 0.2]);
        if let FoldOutcome::Succeeded { timestamps, .. } = &mut second {
            timestamps[0] = Timestamp::Millis(7);
        }
        let outcomes = vec![succeeded(&windows[0], vec![0.1, 0.2]), second];

        let result = PredictionAggregator::new(&schedule).aggregate(outcomes);
        assert!(matches!(result, Err(WalkForwardError::Invariant(_))));
    }

    #[test]
    fn test_overlapping_test_ranges_rejected() {
        let schedule = WindowSchedule::new(10, 0.6, 0.2).unwrap();
        let bad = Window {
            fold: 2,
            train: 1..7,
            test: 7..9,
        };
        let outcomes = vec![
            succeeded(&schedule.windows()[0], vec![0.1, 0.2]),
            succeeded(&bad, vec![0.1, 0.2]),
        ];

        let result = PredictionAggregator::new(&schedule).aggregate(outcomes);
        assert!(matches!(result, Err(WalkForwardError::Invariant(_))));
    }

    #[test]
    fn test_outcome_window_must_match_schedule() {
        let schedule = WindowSchedule::new(10, 0.6, 0.2).unwrap();
        // Right count, no overlap, but ranges that do not match the schedule
        // and cover more rows than exist.
        let first = Window {
            fold: 1,
            train: 0..0,
            test: 0..6,
        };
        let second = Window {
            fold: 2,
            train: 0..6,
            test: 6..12,
        };
        let outcomes = vec![
            succeeded(&first, vec![0.9; 6]),
            succeeded(&second, vec![0.1; 6]),
        ];

        let result = PredictionAggregator::new(&schedule).aggregate(outcomes);
        assert!(matches!(result, Err(WalkForwardError::Invariant(_))));
    }

    #[test]
    fn test_prediction_count_must_match_test_range() {
        let schedule = WindowSchedule::new(10, 0.6, 0.2).unwrap();
        let windows = schedule.windows();
        let mut short = succeeded(&windows[1], vec![0.4, 0.6]);
        if let FoldOutcome::Succeeded {
            timestamps,
            predictions,
            ..
        } = &mut short
        {
            timestamps.pop();
            predictions.probabilities.pop();
            predictions.predicted_labels.pop();
        }
        let outcomes = vec![succeeded(&windows[0], vec![0.1, 0.2]), short];

        let result = PredictionAggregator::new(&schedule).aggregate(outcomes);
        assert!(matches!(result, Err(WalkForwardError::Invariant(_))));
    }

    #[test]
    fn test_fold_summary_json_shape() {
        let schedule = WindowSchedule::new(11, 0.6, 0.2).unwrap();
        let windows = schedule.windows();
        let outcomes = vec![
            FoldOutcome::Failed {
                window: windows[0].clone(),
                error: FitError::SingleClass { class: 1 },
            },
            succeeded(&windows[1], vec![0.9, 0.1]),
        ];
        let report = PredictionAggregator::new(&schedule).aggregate(outcomes).unwrap();

        let skipped = serde_json::to_value(&report.folds[0]).unwrap();
        assert_eq!(skipped["status"], "skipped");
        assert!(skipped["reason"].as_str().unwrap().contains("single class"));

        let scored = serde_json::to_value(&report.folds[1]).unwrap();
        assert_eq!(scored["status"], "succeeded");
        assert_eq!(scored["positives"], 1);

        let back: FoldSummary = serde_json::from_value(skipped).unwrap();
        assert_eq!(back, report.folds[0]);
    }

    #[test]
    fn test_missing_outcome_rejected() {
        let schedule = WindowSchedule::new(10, 0.6, 0.2).unwrap();
        let outcomes = vec![succeeded(&schedule.windows()[0], vec![0.1, 0.2])];

        let result = PredictionAggregator::new(&schedule).aggregate(outcomes);
        assert!(matches!(result, Err(WalkForwardError::Invariant(_))));
    }

    #[test]
    fn test_all_folds_failed() {
        let schedule = WindowSchedule::new(10, 0.6, 0.2).unwrap();
        let outcomes = schedule
            .windows()
            .iter()
            .map(|w| FoldOutcome::Failed {
                window: w.clone(),
                error: FitError::SingleClass { class: 1 },
            })
            .collect();

        let report = PredictionAggregator::new(&schedule).aggregate(outcomes).unwrap();
        assert_eq!(report.total_predictions, 0);
        assert_eq!(report.skipped_folds, 2);
        assert_eq!(report.unscored_rows, 10);
        assert!(report.metrics.is_none());
        assert!(!report.summary().contains("Accuracy"));
    }
}
