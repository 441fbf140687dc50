pub mod matrix;
pub mod store;
pub mod types;

pub use matrix::{FeatureMatrix, MatrixError, MatrixSlice};
pub use store::{write_predictions, FeatureStore, StoreError};
pub use types::{FeatureRecord, FeatureRow, Prediction, Timestamp, INDICATOR_NAMES, N_FEATURES};
