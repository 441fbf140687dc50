//! Out-of-sample scoring module.
//!
//! Compares walk-forward predictions against the recorded labels:
//! - Confusion counts
//! - Accuracy, precision, recall, F1

pub mod classification;

pub use classification::ClassificationMetrics;
