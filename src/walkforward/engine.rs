//! Walk-forward engine.
//!
//! Runs the whole pipeline: matrix build, schedule, folds, aggregation. The
//! engine returns values only; rendering the report is the caller's job.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::classifier::{ClassifierFactory, ForestFactory};
use crate::config::WalkForwardConfig;
use crate::data::{FeatureMatrix, FeatureRecord};

use super::aggregate::{PredictionAggregator, WalkForwardReport};
use super::executor::{FoldExecutor, FoldOutcome};
use super::windows::WindowSchedule;
use super::WalkForwardError;

/// Walk-forward evaluator over a pluggable classifier factory.
pub struct WalkForwardEngine<F: ClassifierFactory> {
    config: WalkForwardConfig,
    factory: F,
}

impl WalkForwardEngine<ForestFactory> {
    /// Engine using the seeded random forest described by `config.classifier`.
    pub fn from_config(config: WalkForwardConfig) -> Self {
        let factory = ForestFactory::new(config.classifier.forest_config());
        Self::new(config, factory)
    }
}

impl<F: ClassifierFactory> WalkForwardEngine<F> {
    pub fn new(config: WalkForwardConfig, factory: F) -> Self {
        Self { config, factory }
    }

    /// Run folds on the rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    /// Validate the configuration and schedule windows for `n_rows` rows.
    pub fn schedule(&self, n_rows: usize) -> Result<WindowSchedule, WalkForwardError> {
        self.config.validate()?;
        WindowSchedule::new(n_rows, self.config.train_ratio, self.config.test_ratio)
    }

    /// Evaluate records in the order given (assumed chronological).
    pub fn run(&self, records: &[FeatureRecord]) -> Result<WalkForwardReport, WalkForwardError> {
        let matrix = FeatureMatrix::build(records);
        self.run_matrix(&matrix)
    }

    pub fn run_matrix(&self, matrix: &FeatureMatrix) -> Result<WalkForwardReport, WalkForwardError> {
        let schedule = self.schedule(matrix.len())?;
        let total = schedule.len();

        info!(
            "Scheduled {} walk-forward folds over {} rows (train {}, test {}, {} positive labels)",
            total,
            matrix.len(),
            schedule.train_len(),
            schedule.test_len(),
            matrix.positive_labels()
        );

        let executor = FoldExecutor::new(&self.factory, self.config.decision_threshold);

        let outcomes = if self.config.parallel {
            // Windows are fixed up front and folds read disjoint slices.
            let outcomes = schedule
                .windows()
                .par_iter()
                .map(|window| executor.execute(matrix, window))
                .collect::<Result<Vec<_>, _>>()?;
            for outcome in &outcomes {
                log_outcome(matrix, outcome, total);
            }
            outcomes
        } else {
            let mut outcomes = Vec::with_capacity(total);
            for window in schedule.windows() {
                let outcome = executor.execute(matrix, window)?;
                log_outcome(matrix, &outcome, total);
                outcomes.push(outcome);
            }
            outcomes
        };

        let report = PredictionAggregator::new(&schedule).aggregate(outcomes)?;

        info!(
            "Produced {} out-of-sample predictions from {}/{} folds ({} skipped)",
            report.total_predictions, report.succeeded_folds, total, report.skipped_folds
        );
        if report.tail_rows > 0 {
            warn!("{} tail rows after the last test window have no signal", report.tail_rows);
        }

        Ok(report)
    }
}

fn log_outcome(matrix: &FeatureMatrix, outcome: &FoldOutcome, total: usize) {
    let window = outcome.window();
    let timestamps = matrix.timestamps();
    match outcome {
        FoldOutcome::Succeeded { predictions, .. } => info!(
            "Fold {}/{}: train [{}, {}) test [{}, {}) {} .. {}; test positives {}",
            window.fold,
            total,
            window.train.start,
            window.train.end,
            window.test.start,
            window.test.end,
            timestamps[window.test.start],
            timestamps[window.test.end - 1],
            predictions.positives()
        ),
        FoldOutcome::Failed { error, .. } => info!(
            "Fold {}/{}: train [{}, {}) test [{}, {}) skipped ({})",
            window.fold, total, window.train.start, window.train.end, window.test.start, window.test.end, error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, FitError};
    use crate::config::ClassifierConfig;
    use crate::data::{FeatureRow, Timestamp, N_FEATURES};

    fn small_config() -> WalkForwardConfig {
        WalkForwardConfig {
            classifier: ClassifierConfig {
                size: 10,
                max_depth: 4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Records whose `ma5` is the row index and `rsi` tracks the label.
    fn records(labels: &[u8]) -> Vec<FeatureRecord> {
        labels
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let mut values = [None; N_FEATURES];
                values[0] = Some(i as f64);
                let level = if label == 1 { 70.0 } else { 30.0 };
                values[4] = Some(level + (i % 5) as f64);
                FeatureRecord::new(1_000 * i as i64)
                    .with_indicators(values)
                    .with_label(label)
            })
            .collect()
    }

    fn alternating(n: usize) -> Vec<u8> {
        (0..n).map(|i| ((i / 3) % 2) as u8).collect()
    }

    #[test]
    fn test_ten_rows_two_folds_four_predictions() {
        let engine = WalkForwardEngine::from_config(small_config());
        let report = engine.run(&records(&[0, 1, 0, 1, 1, 0, 1, 0, 1, 0])).unwrap();

        assert_eq!(report.total_folds(), 2);
        assert_eq!(report.succeeded_folds, 2);
        assert_eq!(report.total_predictions, 4);
        assert_eq!(report.tail_rows, 0);
        assert_eq!(report.folds[0].train, 0..6);
        assert_eq!(report.folds[0].test, 6..8);
        assert_eq!(report.folds[1].train, 2..8);
        assert_eq!(report.folds[1].test, 8..10);

        let stamps: Vec<_> = report.predictions.iter().map(|p| p.timestamp.clone()).collect();
        assert_eq!(
            stamps,
            vec![
                Timestamp::Millis(6_000),
                Timestamp::Millis(7_000),
                Timestamp::Millis(8_000),
                Timestamp::Millis(9_000)
            ]
        );
        for p in &report.predictions {
            assert!((0.0..=1.0).contains(&p.probability));
            assert_eq!(p.predicted_label, u8::from(p.probability > 0.5));
        }
    }

    #[test]
    fn test_single_class_fold_skipped_run_completes() {
        let engine = WalkForwardEngine::from_config(small_config());
        // Fold 1 trains on rows 0..6, all label 0.
        let report = engine.run(&records(&[0, 0, 0, 0, 0, 0, 1, 0, 1, 0])).unwrap();

        assert_eq!(report.total_folds(), 2);
        assert_eq!(report.succeeded_folds, 1);
        assert_eq!(report.skipped_folds, 1);
        assert_eq!(report.total_predictions, 2);
        assert_eq!(report.unscored_rows, 8);
        assert!(report.predictions.iter().all(|p| p.timestamp >= Timestamp::Millis(8_000)));
    }

    #[test]
    fn test_repeated_timestamp_is_invariant_violation() {
        let mut data = records(&[0, 1, 0, 1, 1, 0, 1, 0, 1, 0]);
        // Rows 6 and 7 share fold 1's test range.
        data[7].timestamp = data[6].timestamp.clone();

        let result = WalkForwardEngine::from_config(small_config()).run(&data);
        assert!(matches!(result, Err(WalkForwardError::Invariant(_))));

        let parallel = WalkForwardEngine::from_config(small_config())
            .with_parallel(true)
            .run(&data);
        assert!(matches!(parallel, Err(WalkForwardError::Invariant(_))));
    }

    #[test]
    fn test_zero_test_len_is_configuration_error() {
        let config = WalkForwardConfig {
            test_ratio: 0.05,
            ..small_config()
        };
        let result = WalkForwardEngine::from_config(config).run(&records(&alternating(10)));
        assert!(matches!(result, Err(WalkForwardError::Configuration(_))));
    }

    #[test]
    fn test_invalid_threshold_rejected_before_folds() {
        let config = WalkForwardConfig {
            decision_threshold: -0.1,
            ..small_config()
        };
        let result = WalkForwardEngine::from_config(config).run(&records(&alternating(50)));
        assert!(matches!(result, Err(WalkForwardError::Configuration(_))));
    }

    #[test]
    fn test_predictions_sorted_and_unique() {
        let config = WalkForwardConfig {
            train_ratio: 0.3,
            test_ratio: 0.1,
            ..small_config()
        };
        let report = WalkForwardEngine::from_config(config).run(&records(&alternating(205))).unwrap();

        // train 61, test 20 -> folds start at 0, 20, ..., 120.
        assert_eq!(report.total_folds(), 7);
        assert_eq!(report.total_predictions, 140);
        assert_eq!(report.tail_rows, 4);
        assert!(report
            .predictions
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(
            report.leading_rows + report.total_predictions + report.tail_rows,
            report.n_rows
        );
    }

    #[test]
    fn test_repeated_runs_are_deterministic() {
        let data = records(&alternating(120));
        let engine = WalkForwardEngine::from_config(small_config());

        let first = engine.run(&data).unwrap();
        let second = engine.run(&data).unwrap();

        assert_eq!(first.predictions, second.predictions);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = records(&alternating(150));
        let config = WalkForwardConfig {
            train_ratio: 0.4,
            test_ratio: 0.1,
            ..small_config()
        };

        let sequential = WalkForwardEngine::from_config(config.clone()).run(&data).unwrap();
        let parallel = WalkForwardEngine::from_config(config)
            .with_parallel(true)
            .run(&data)
            .unwrap();

        assert_eq!(sequential.predictions, parallel.predictions);
        assert_eq!(sequential.folds, parallel.folds);
    }

    /// Fails scoring if any test row is not strictly after every train row.
    struct LookaheadGuard {
        max_train_index: Option<f64>,
    }

    impl Classifier for LookaheadGuard {
        fn fit(&mut self, features: &[FeatureRow], _labels: &[u8]) -> Result<(), FitError> {
            self.max_train_index = features.iter().map(|r| r[0]).reduce(f64::max);
            Ok(())
        }

        fn predict_proba(&self, features: &[FeatureRow]) -> Result<Vec<f64>, FitError> {
            let max_train = self.max_train_index.ok_or(FitError::NotFitted)?;
            if features.iter().any(|r| r[0] <= max_train) {
                return Err(FitError::Degenerate("test row not after train rows".to_string()));
            }
            Ok(vec![0.25; features.len()])
        }
    }

    #[test]
    fn test_no_lookahead_in_any_fold() {
        let factory = || LookaheadGuard { max_train_index: None };
        let config = WalkForwardConfig {
            train_ratio: 0.25,
            test_ratio: 0.05,
            ..small_config()
        };
        let report = WalkForwardEngine::new(config, factory)
            .run(&records(&alternating(100)))
            .unwrap();

        assert_eq!(report.skipped_folds, 0);
        assert_eq!(report.succeeded_folds, report.total_folds());
        assert!(report.predictions.iter().all(|p| p.predicted_label == 0));
    }
}
