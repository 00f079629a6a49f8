// src/model/mod.rs
pub mod artifact;
pub mod metrics;
pub mod regressor;
pub mod store;
pub mod trainer;

pub use artifact::{ArtifactMetadata, ModelArtifact};
pub use metrics::RegressionMetrics;
pub use regressor::{BoostingParams, FittedRegressor, ForestParams, ModelFamily, ModelParams};
pub use trainer::{train, train_preprocessed, CandidateScore, FeatureImportance, TrainingReport};
