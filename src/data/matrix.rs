//! Feature matrix construction.
//!
//! Converts loaded records into a fixed-width numeric matrix with a parallel
//! label vector and timestamp sequence. Imputation is deliberately simple:
//! any missing, null or non-finite indicator becomes `0.0`. There is no
//! mean/median fill, so nothing from later rows can leak into earlier ones.

use std::ops::Range;

use thiserror::Error;

use super::types::{FeatureRecord, FeatureRow, Timestamp, N_FEATURES};

#[derive(Error, Debug, PartialEq)]
pub enum MatrixError {
    #[error("Length mismatch: {rows} rows, {labels} labels, {timestamps} timestamps")]
    LengthMismatch {
        rows: usize,
        labels: usize,
        timestamps: usize,
    },

    #[error("Slice {start}..{end} out of bounds for {len} rows")]
    OutOfBounds { start: usize, end: usize, len: usize },
}

/// Row-aligned features, labels and timestamps.
///
/// Row order equals input record order. Chronological ordering of the input
/// is the caller's responsibility and is not checked here.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<FeatureRow>,
    labels: Vec<u8>,
    timestamps: Vec<Timestamp>,
}

impl FeatureMatrix {
    /// Build a matrix from records. Output length always equals input length.
    ///
    /// A missing label is read as 0. That conflates "confirmed negative" with
    /// "no ground truth yet" (e.g. the last bars of an export whose forward
    /// window has not closed); callers that care should drop such records
    /// upstream.
    pub fn build(records: &[FeatureRecord]) -> Self {
        let mut rows = Vec::with_capacity(records.len());
        let mut labels = Vec::with_capacity(records.len());
        let mut timestamps = Vec::with_capacity(records.len());

        for record in records {
            rows.push(impute_row(record));
            labels.push(match record.label {
                Some(0) | None => 0,
                Some(_) => 1,
            });
            timestamps.push(record.timestamp.clone());
        }

        Self {
            rows,
            labels,
            timestamps,
        }
    }

    /// Assemble a matrix from pre-built columns, checking they line up.
    pub fn from_parts(
        rows: Vec<FeatureRow>,
        labels: Vec<u8>,
        timestamps: Vec<Timestamp>,
    ) -> Result<Self, MatrixError> {
        if rows.len() != labels.len() || rows.len() != timestamps.len() {
            return Err(MatrixError::LengthMismatch {
                rows: rows.len(),
                labels: labels.len(),
                timestamps: timestamps.len(),
            });
        }
        Ok(Self {
            rows,
            labels,
            timestamps,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        N_FEATURES
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    /// Borrow a contiguous block of rows, labels and timestamps.
    pub fn slice(&self, range: Range<usize>) -> Result<MatrixSlice<'_>, MatrixError> {
        if range.start > range.end || range.end > self.len() {
            return Err(MatrixError::OutOfBounds {
                start: range.start,
                end: range.end,
                len: self.len(),
            });
        }
        Ok(MatrixSlice {
            rows: &self.rows[range.clone()],
            labels: &self.labels[range.clone()],
            timestamps: &self.timestamps[range],
        })
    }

    /// Number of rows labelled 1.
    pub fn positive_labels(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Read-only view over a row range of a [`FeatureMatrix`].
#[derive(Debug, Clone, Copy)]
pub struct MatrixSlice<'a> {
    pub rows: &'a [FeatureRow],
    pub labels: &'a [u8],
    pub timestamps: &'a [Timestamp],
}

impl MatrixSlice<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn impute_row(record: &FeatureRecord) -> FeatureRow {
    let mut row = [0.0; N_FEATURES];
    for (slot, value) in row.iter_mut().zip(record.indicators()) {
        *slot = match value {
            Some(v) if v.is_finite() => v,
            _ => 0.0,
        };
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: i64, value: f64, label: Option<u8>) -> FeatureRecord {
        let mut r = FeatureRecord::new(ts).with_indicators([Some(value); N_FEATURES]);
        r.label = label;
        r
    }

    #[test]
    fn test_all_null_record_imputes_to_zero_row() {
        let records = vec![FeatureRecord::new(1)];

        let first = FeatureMatrix::build(&records);
        let second = FeatureMatrix::build(&records);

        assert_eq!(first.rows()[0], [0.0; N_FEATURES]);
        assert_eq!(first.labels(), &[0]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_nulls_and_non_finite() {
        let mut values = [Some(1.0); N_FEATURES];
        values[4] = None;
        values[10] = Some(f64::NAN);
        let records = vec![FeatureRecord::new(1).with_indicators(values).with_label(1)];

        let matrix = FeatureMatrix::build(&records);
        let row = matrix.rows()[0];

        assert_eq!(row[0], 1.0);
        assert_eq!(row[4], 0.0);
        assert_eq!(row[10], 0.0);
        assert_eq!(row[11], 1.0);
        assert_eq!(matrix.labels(), &[1]);
    }

    #[test]
    fn test_order_and_length_preserved() {
        let records: Vec<_> = (0..5).map(|i| record(10 - i, i as f64, Some((i % 2) as u8))).collect();
        let matrix = FeatureMatrix::build(&records);

        assert_eq!(matrix.len(), 5);
        assert_eq!(matrix.labels().len(), 5);
        assert_eq!(matrix.timestamps().len(), 5);
        // Unsorted input stays unsorted.
        assert_eq!(matrix.timestamps()[0], Timestamp::Millis(10));
        assert_eq!(matrix.timestamps()[4], Timestamp::Millis(6));
        assert_eq!(matrix.rows()[3][0], 3.0);
        assert_eq!(matrix.positive_labels(), 2);
    }

    #[test]
    fn test_nonzero_label_maps_to_one() {
        let matrix = FeatureMatrix::build(&[record(1, 0.0, Some(3))]);
        assert_eq!(matrix.labels(), &[1]);
    }

    #[test]
    fn test_from_parts_length_mismatch() {
        let err = FeatureMatrix::from_parts(
            vec![[0.0; N_FEATURES]; 3],
            vec![0, 1],
            vec![Timestamp::Millis(1), Timestamp::Millis(2), Timestamp::Millis(3)],
        )
        .unwrap_err();

        assert_eq!(
            err,
            MatrixError::LengthMismatch {
                rows: 3,
                labels: 2,
                timestamps: 3
            }
        );
    }

    #[test]
    fn test_slice_bounds() {
        let records: Vec<_> = (0..4).map(|i| record(i, i as f64, None)).collect();
        let matrix = FeatureMatrix::build(&records);

        let slice = matrix.slice(1..3).unwrap();
        assert_eq!(slice.len(), 2);
        assert_eq!(slice.timestamps[0], Timestamp::Millis(1));

        assert!(matrix.slice(2..5).is_err());
    }
}
