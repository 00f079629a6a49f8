// src/lib.rs
pub mod config;
pub mod data;
pub mod errors;
pub mod features;
pub mod matching;
pub mod model;
pub mod predictor;
pub mod service;
pub mod utils;

pub use config::{EstimatorConfig, TrainingConfig};
pub use errors::{EstimatorError, Result};
pub use features::RawFields;
pub use model::ModelArtifact;
pub use predictor::Predictor;
pub use service::{AddressValidation, EstimatorHandle, EstimatorService, PriceEstimate};
