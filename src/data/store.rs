//! Feature record store.
//!
//! Loads precomputed feature records from disk. Two layouts are accepted:
//! - a JSON array of records (the indicator exporter's `features.json`)
//! - newline-delimited JSON, one record per line
//!
//! Everything is loaded eagerly; no I/O happens once folds start.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use super::types::{FeatureRecord, Prediction};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON error on line {line}: {source}")]
    JsonLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("No feature records in {0}")]
    Empty(String),
}

/// Read-only store of feature records for one run.
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    records: Vec<FeatureRecord>,
}

impl FeatureStore {
    pub fn new(records: Vec<FeatureRecord>) -> Self {
        Self { records }
    }

    /// Load records from a JSON array or JSON-lines file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;
        let records = Self::parse(&content)?;
        if records.is_empty() {
            return Err(StoreError::Empty(path.display().to_string()));
        }

        info!("Loaded {} feature records from {}", records.len(), path.display());
        Ok(Self { records })
    }

    /// Parse records from an in-memory document.
    pub fn parse(content: &str) -> Result<Vec<FeatureRecord>, StoreError> {
        if content.trim_start().starts_with('[') {
            debug!("Parsing feature records as JSON array");
            return Ok(serde_json::from_str(content)?);
        }

        debug!("Parsing feature records as JSON lines");
        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|source| StoreError::JsonLine {
                line: idx + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Write predictions as a JSON array of `{timestamp, predicted_label, probability}`.
pub fn write_predictions(path: impl AsRef<Path>, predictions: &[Prediction]) -> Result<(), StoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut writer, predictions)?;
    writer.flush()?;

    info!("Saved {} predictions to {}", predictions.len(), path.display());
    Ok(())
}
