//! Walk-forward validation module.
//!
//! Splits a time-ordered feature matrix into rolling train/test windows,
//! fits a fresh classifier per window and keeps only predictions for rows the
//! classifier never saw:
//! - Train: `floor(n * train_ratio)` rows
//! - Test: `floor(n * test_ratio)` rows, immediately after train
//! - Roll: by the test length, so test ranges tile without overlap

pub mod aggregate;
pub mod engine;
pub mod executor;
pub mod windows;

use thiserror::Error;

use crate::data::{MatrixError, StoreError};

pub use aggregate::{FoldStatus, FoldSummary, PredictionAggregator, WalkForwardReport};
pub use engine::WalkForwardEngine;
pub use executor::{FoldExecutor, FoldOutcome, FoldPredictions};
pub use windows::{Window, WindowSchedule};

/// Fatal walk-forward errors. Per-fold fit failures are not errors; they are
/// recorded as [`FoldOutcome::Failed`] and the run continues.
#[derive(Error, Debug)]
pub enum WalkForwardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<MatrixError> for WalkForwardError {
    fn from(err: MatrixError) -> Self {
        Self::Invariant(err.to_string())
    }
}

impl From<crate::config::ConfigError> for WalkForwardError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
