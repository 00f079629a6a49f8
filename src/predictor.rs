// src/predictor.rs
use log::debug;
use std::sync::Arc;

use crate::errors::{EstimatorError, Result};
use crate::features::RawFields;
use crate::model::ModelArtifact;

/// Turns one request into one non-negative price using the loaded artifact.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    artifact: Option<Arc<ModelArtifact>>,
}

impl Predictor {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self {
            artifact: Some(artifact),
        }
    }

    /// A predictor with nothing loaded. Every prediction is `NotTrained`.
    pub fn untrained() -> Self {
        Self::default()
    }

    pub fn is_trained(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn artifact(&self) -> Option<&Arc<ModelArtifact>> {
        self.artifact.as_ref()
    }

    pub fn predict(&self, fields: &RawFields) -> Result<f64> {
        let artifact = self.artifact.as_ref().ok_or(EstimatorError::NotTrained)?;
        let vector = artifact.build_features(fields);
        let raw = artifact.predict_vector(&vector)?;
        if !raw.is_finite() {
            return Err(EstimatorError::InvalidRequest(
                "prediction is out of range for the given inputs".to_string(),
            ));
        }
        debug!("Raw prediction {:.2} for {:?}", raw, vector);
        Ok(raw.max(0.0))
    }
}
