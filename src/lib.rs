pub mod classifier;
pub mod config;
pub mod data;
pub mod metrics;
pub mod walkforward;

// Re-export commonly used types
pub use classifier::{Classifier, ClassifierFactory, FitError, ForestConfig, ForestFactory, RandomForestClassifier};
pub use config::{ClassifierConfig, ConfigError, WalkForwardConfig};
pub use data::{FeatureMatrix, FeatureRecord, FeatureStore, Prediction, StoreError, Timestamp, INDICATOR_NAMES};
pub use metrics::ClassificationMetrics;
pub use walkforward::{
    FoldExecutor, FoldOutcome, PredictionAggregator, WalkForwardEngine, WalkForwardError, WalkForwardReport, Window,
    WindowSchedule,
};
