//! Walk-forward window generation.
//!
//! Generates index-based train/test windows over a matrix of `n` rows.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::validate_ratios;

use super::WalkForwardError;

/// A single walk-forward window: half-open train and test row ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Fold number (1-indexed).
    pub fold: usize,
    /// Training rows.
    pub train: Range<usize>,
    /// Test rows; starts exactly where `train` ends.
    pub test: Range<usize>,
}

impl Window {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn test_len(&self) -> usize {
        self.test.len()
    }
}

/// The full list of windows for a dataset, computed before any fold runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSchedule {
    n_rows: usize,
    train_len: usize,
    test_len: usize,
    windows: Vec<Window>,
}

impl WindowSchedule {
    /// Schedule windows over `n_rows` rows.
    ///
    /// Each fold trains on its own `train_len` rows only (no expanding
    /// history), which keeps per-fold cost constant. Later train ranges
    /// therefore overlap earlier test ranges; test ranges never overlap.
    pub fn new(n_rows: usize, train_ratio: f64, test_ratio: f64) -> Result<Self, WalkForwardError> {
        validate_ratios(train_ratio, test_ratio)?;

        let train_len = (n_rows as f64 * train_ratio).floor() as usize;
        let test_len = (n_rows as f64 * test_ratio).floor() as usize;

        // A zero step would never advance.
        if test_len == 0 {
            return Err(WalkForwardError::Configuration(format!(
                "test_ratio {} yields an empty test window for {} rows",
                test_ratio, n_rows
            )));
        }
        if train_len == 0 {
            return Err(WalkForwardError::Configuration(format!(
                "train_ratio {} yields an empty train window for {} rows",
                train_ratio, n_rows
            )));
        }

        let mut windows = Vec::new();
        let mut start = 0;
        while start + train_len + test_len <= n_rows {
            let split = start + train_len;
            windows.push(Window {
                fold: windows.len() + 1,
                train: start..split,
                test: split..split + test_len,
            });
            start += test_len;
        }

        Ok(Self {
            n_rows,
            train_len,
            test_len,
            windows,
        })
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn train_len(&self) -> usize {
        self.train_len
    }

    pub fn test_len(&self) -> usize {
        self.test_len
    }

    /// Rows before the first test range. They are only ever trained on.
    pub fn leading_rows(&self) -> usize {
        self.windows.first().map(|w| w.test.start).unwrap_or(0)
    }

    /// Rows after the last test range. No window covers them, so they get no signal.
    pub fn tail_rows(&self) -> usize {
        self.n_rows - self.windows.last().map(|w| w.test.end).unwrap_or(0)
    }

    /// Rows that would be scored if every fold succeeds.
    pub fn covered_rows(&self) -> usize {
        self.windows.len() * self.test_len
    }
}
