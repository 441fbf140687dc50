//! Core data types for walk-forward evaluation.
//!
//! Feature records arrive precomputed from an external indicator pipeline
//! (moving averages, RSI, ADX, ...). These types only carry them through the
//! evaluation; nothing here computes indicators.

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Number of indicator columns in every feature row.
pub const N_FEATURES: usize = 12;

/// Indicator names in feature-column order.
pub const INDICATOR_NAMES: [&str; N_FEATURES] = [
    "ma5",
    "ma7",
    "ma20",
    "ma50",
    "rsi",
    "atr",
    "adx",
    "bb_width",
    "vol20",
    "volume",
    "macd",
    "macd_signal",
];

/// A single fixed-width feature row.
pub type FeatureRow = [f64; N_FEATURES];

/// Observation timestamp.
///
/// Treated as opaque and totally ordered. Candle exports use epoch
/// milliseconds; string timestamps (e.g. ISO-8601) are accepted as-is and
/// compared lexically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl From<i64> for Timestamp {
    fn from(ms: i64) -> Self {
        Self::Millis(ms)
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(ms) => match DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
                None => write!(f, "{}", ms),
            },
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One observation: timestamp, 12 nullable indicators and a binary label.
///
/// Extra keys in the source (e.g. `close`) are ignored on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub timestamp: Timestamp,
    pub ma5: Option<f64>,
    pub ma7: Option<f64>,
    pub ma20: Option<f64>,
    pub ma50: Option<f64>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub adx: Option<f64>,
    pub bb_width: Option<f64>,
    pub vol20: Option<f64>,
    pub volume: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    /// Forward-return label. Absent means "no ground truth", but is read as 0.
    pub label: Option<u8>,
}

impl FeatureRecord {
    /// Create a record with every indicator and the label absent.
    pub fn new(timestamp: impl Into<Timestamp>) -> Self {
        Self {
            timestamp: timestamp.into(),
            ma5: None,
            ma7: None,
            ma20: None,
            ma50: None,
            rsi: None,
            atr: None,
            adx: None,
            bb_width: None,
            vol20: None,
            volume: None,
            macd: None,
            macd_signal: None,
            label: None,
        }
    }

    /// Indicator values in [`INDICATOR_NAMES`] order.
    pub fn indicators(&self) -> [Option<f64>; N_FEATURES] {
        [
            self.ma5,
            self.ma7,
            self.ma20,
            self.ma50,
            self.rsi,
            self.atr,
            self.adx,
            self.bb_width,
            self.vol20,
            self.volume,
            self.macd,
            self.macd_signal,
        ]
    }

    /// Set all indicators from a row in [`INDICATOR_NAMES`] order.
    pub fn with_indicators(mut self, values: [Option<f64>; N_FEATURES]) -> Self {
        let [ma5, ma7, ma20, ma50, rsi, atr, adx, bb_width, vol20, volume, macd, macd_signal] =
            values;
        self.ma5 = ma5;
        self.ma7 = ma7;
        self.ma20 = ma20;
        self.ma50 = ma50;
        self.rsi = rsi;
        self.atr = atr;
        self.adx = adx;
        self.bb_width = bb_width;
        self.vol20 = vol20;
        self.volume = volume;
        self.macd = macd;
        self.macd_signal = macd_signal;
        self
    }

    pub fn with_label(mut self, label: u8) -> Self {
        self.label = Some(label);
        self
    }
}

/// A single out-of-sample prediction.
///
/// Field names are the persistence contract consumed by downstream backtests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub timestamp: Timestamp,
    pub predicted_label: u8,
    pub probability: f64,
}
