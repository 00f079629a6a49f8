// src/model/artifact.rs
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EstimatorError, Result};
use crate::features::{self, AddressEncoder, FeatureVector, RawFields, StandardScaler};
use crate::model::regressor::{FittedRegressor, ModelFamily, ModelParams};
use crate::model::trainer::TrainingReport;
use crate::utils::constants::{FEATURE_COUNT, FEATURE_NAMES};

/// Provenance of one training run. Never consulted at inference time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub artifact_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub params: ModelParams,
    pub report: TrainingReport,
}

/// Everything needed to serve predictions, fitted together and replaced together.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    regressor: FittedRegressor,
    scaler: StandardScaler,
    encoder: AddressEncoder,
    feature_names: Vec<String>,
    metadata: ArtifactMetadata,
}

impl ModelArtifact {
    pub(crate) fn new(
        regressor: FittedRegressor,
        scaler: StandardScaler,
        encoder: AddressEncoder,
        params: ModelParams,
        report: TrainingReport,
    ) -> Self {
        Self {
            regressor,
            scaler,
            encoder,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            metadata: ArtifactMetadata {
                artifact_id: Uuid::new_v4(),
                trained_at: Utc::now(),
                params,
                report,
            },
        }
    }

    pub fn family(&self) -> ModelFamily {
        self.regressor.family()
    }

    pub fn encoder(&self) -> &AddressEncoder {
        &self.encoder
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn build_features(&self, fields: &RawFields) -> FeatureVector {
        features::build(fields, &self.encoder)
    }

    /// Raw model output for one vector, scaled first when the family needs it. Not clamped.
    pub fn predict_vector(&self, vector: &FeatureVector) -> Result<f64> {
        let raw = vector.as_array();
        let row = if self.family().requires_scaling() {
            self.scaler.transform_row(&raw)
        } else {
            raw.to_vec()
        };
        let x = Array2::from_shape_vec((1, FEATURE_COUNT), row)
            .map_err(|e| EstimatorError::Training(format!("bad feature row shape: {}", e)))?;
        self.regressor
            .predict(x.view())?
            .first()
            .copied()
            .ok_or_else(|| EstimatorError::Training("model returned no prediction".to_string()))
    }

    /// Rejects bundles whose parts disagree with this build's feature layout.
    pub(crate) fn check_compatible(&self) -> Result<()> {
        if self.feature_names.len() != FEATURE_COUNT
            || self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .any(|(stored, expected)| stored != expected)
        {
            return Err(EstimatorError::Store(format!(
                "feature order mismatch: artifact has {:?}, expected {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }
        if self.encoder.is_empty() {
            return Err(EstimatorError::Store(
                "address encoder has an empty vocabulary".to_string(),
            ));
        }
        if !self.encoder.is_sorted_unique() {
            return Err(EstimatorError::Store(
                "address encoder vocabulary is not sorted".to_string(),
            ));
        }
        if self.scaler.n_features() != FEATURE_COUNT {
            return Err(EstimatorError::Store(format!(
                "scaler was fitted on {} features, expected {}",
                self.scaler.n_features(),
                FEATURE_COUNT
            )));
        }
        if self.metadata.params.family() != self.family() {
            return Err(EstimatorError::Store(format!(
                "metadata names {} but the fitted model is {}",
                self.metadata.params.family(),
                self.family()
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn feature_names_mut(&mut self) -> &mut Vec<String> {
        &mut self.feature_names
    }

    /// Linear artifact fitted on scaled rows whose target is `1e7 * area - 9e8`,
    /// so small areas extrapolate below zero.
    #[cfg(test)]
    pub(crate) fn linear_fixture() -> Self {
        use crate::model::metrics::RegressionMetrics;
        use ndarray::Array1;

        let encoder = AddressEncoder::fit(["Narmak", "Punak", "Shahran"]);
        let n = 30;
        let mut x = Array2::<f64>::zeros((n, FEATURE_COUNT));
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let area = 60.0 + 4.0 * i as f64;
            let vector = FeatureVector::new(
                area,
                (i % 4) as f64,
                (i % 2) as f64,
                ((i / 2) % 2) as f64,
                ((i / 3) % 2) as f64,
                i % encoder.len(),
            );
            x.row_mut(i).assign(&Array1::from(vector.as_array().to_vec()));
            y[i] = 1.0e7 * area - 9.0e8;
        }
        let scaler = StandardScaler::fit(x.view()).unwrap();
        let scaled = scaler.transform(x.view());
        let regressor = ModelParams::Linear.fit(scaled.view(), y.view()).unwrap();
        let report = TrainingReport {
            candidate_scores: Vec::new(),
            selected_family: ModelFamily::Linear,
            grid_size: 0,
            grid_best_score: None,
            test_metrics: RegressionMetrics {
                r2: 1.0,
                mse: 0.0,
                mae: 0.0,
            },
            feature_importance: Vec::new(),
            train_rows: n,
            test_rows: 0,
        };
        Self::new(regressor, scaler, encoder, ModelParams::Linear, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predict_row(artifact: &ModelArtifact, row: Vec<f64>) -> f64 {
        let x = Array2::from_shape_vec((1, FEATURE_COUNT), row).unwrap();
        artifact.regressor.predict(x.view()).unwrap()[0]
    }

    #[test]
    fn test_linear_family_predicts_on_scaled_row() {
        let artifact = ModelArtifact::linear_fixture();
        assert!(artifact.family().requires_scaling());
        let vector = artifact.build_features(&RawFields::new(80.0, 2, true, false, true, "Punak"));
        let raw = vector.as_array();

        let served = artifact.predict_vector(&vector).unwrap();
        let scaled = predict_row(&artifact, artifact.scaler.transform_row(&raw));
        let unscaled = predict_row(&artifact, raw.to_vec());

        assert_eq!(served.to_bits(), scaled.to_bits());
        assert!((served - unscaled).abs() > 1.0);
        assert!((served - (1.0e7 * 80.0 - 9.0e8)).abs() < 1.0e3);
    }

    #[test]
    fn test_linear_fixture_is_compatible() {
        assert!(ModelArtifact::linear_fixture().check_compatible().is_ok());
    }
}
