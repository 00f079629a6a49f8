// src/service.rs
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::config::EstimatorConfig;
use crate::data::{self, AddressStats, DatasetStats, HistoricalRecord, RawRecord};
use crate::errors::Result;
use crate::features::RawFields;
use crate::matching::{self, AddressCatalog, MatchCandidate, Validation};
use crate::model::{store, trainer, ModelArtifact};
use crate::predictor::Predictor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEstimate {
    /// Unrounded model output after clamping, in primary currency.
    pub raw_price: f64,
    pub price: f64,
    pub price_secondary: f64,
    /// The address fed to the encoder: the canonical catalog spelling when
    /// validation succeeded, the caller's text otherwise.
    pub address_used: String,
}

impl PriceEstimate {
    pub fn new(raw_price: f64, currency_divisor: f64, address_used: String) -> Self {
        Self {
            raw_price,
            price: raw_price.round(),
            price_secondary: (raw_price / currency_divisor).round(),
            address_used,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl From<Validation> for AddressValidation {
    fn from(validation: Validation) -> Self {
        match validation {
            Validation::Valid {
                matched,
                confidence,
            } => Self {
                valid: true,
                matched_address: Some(matched),
                confidence: Some(confidence),
                suggestions: None,
            },
            Validation::Invalid { suggestions } => Self {
                valid: false,
                matched_address: None,
                confidence: None,
                suggestions: Some(suggestions),
            },
        }
    }
}

/// Read-only serving state: one artifact, its address catalog and the corpus statistics.
#[derive(Debug)]
pub struct EstimatorService {
    predictor: Predictor,
    catalog: AddressCatalog,
    history: Vec<HistoricalRecord>,
    stats: DatasetStats,
    currency_divisor: f64,
}

impl EstimatorService {
    pub fn new(artifact: ModelArtifact, history: Vec<HistoricalRecord>, currency_divisor: f64) -> Self {
        let catalog =
            AddressCatalog::from_vocabulary(artifact.encoder().classes().iter().map(String::as_str));
        let stats = DatasetStats::compute(&history);
        Self {
            predictor: Predictor::new(Arc::new(artifact)),
            catalog,
            history,
            stats,
            currency_divisor,
        }
    }

    /// Loads the artifact at `model_path`, training and saving one first if
    /// the file does not exist. A bundle that exists but fails to load is an error.
    pub fn initialize(config: &EstimatorConfig) -> Result<Self> {
        let records = data::load_csv(&config.data_path)?;
        let artifact = if config.model_path.exists() {
            store::load(&config.model_path)?
        } else {
            warn!(
                "No model at {}, training a new one from {}",
                config.model_path.display(),
                config.data_path.display()
            );
            train_and_save(&records, config)?
        };
        Ok(Self::from_records(artifact, &records, config.currency_divisor))
    }

    /// Trains a fresh artifact from the configured CSV regardless of what is on disk.
    pub fn retrain(config: &EstimatorConfig) -> Result<Self> {
        let records = data::load_csv(&config.data_path)?;
        let artifact = train_and_save(&records, config)?;
        Ok(Self::from_records(artifact, &records, config.currency_divisor))
    }

    pub fn from_records(artifact: ModelArtifact, records: &[RawRecord], currency_divisor: f64) -> Self {
        let history = records.iter().filter_map(RawRecord::complete).collect();
        Self::new(artifact, history, currency_divisor)
    }

    pub fn artifact(&self) -> Option<&Arc<ModelArtifact>> {
        self.predictor.artifact()
    }

    pub fn predict(&self, fields: &RawFields) -> Result<PriceEstimate> {
        let requested = fields.address_text();
        let address_used = match matching::validate(&requested, &self.catalog) {
            Ok(Validation::Valid { matched, .. }) => matched,
            _ => requested,
        };
        let raw_price = self.predictor.predict(&fields.with_address(&address_used))?;
        Ok(PriceEstimate::new(
            raw_price,
            self.currency_divisor,
            address_used,
        ))
    }

    pub fn search_addresses(&self, query: &str) -> Vec<MatchCandidate> {
        matching::search(query, &self.catalog)
    }

    pub fn validate_address(&self, address: &str) -> Result<AddressValidation> {
        matching::validate(address, &self.catalog).map(AddressValidation::from)
    }

    pub fn nearest_addresses(&self, query: &str, k: usize) -> Vec<(String, f64)> {
        matching::nearest(query, &self.catalog, k)
    }

    pub fn list_addresses(&self) -> &[String] {
        self.catalog.entries()
    }

    pub fn dataset_stats(&self) -> &DatasetStats {
        &self.stats
    }

    pub fn address_stats(&self, address: &str) -> Result<AddressStats> {
        AddressStats::compute(&self.history, address)
    }

    pub fn currency_divisor(&self) -> f64 {
        self.currency_divisor
    }
}

fn train_and_save(records: &[RawRecord], config: &EstimatorConfig) -> Result<ModelArtifact> {
    let prepared = data::preprocess(records)?;
    let artifact = trainer::train_preprocessed(prepared, &config.training)?;
    store::save(&artifact, &config.model_path)?;
    Ok(artifact)
}

/// Shared access to the current service. Readers take a cheap `Arc` clone;
/// a retrain publishes a new service with one `swap`.
#[derive(Debug)]
pub struct EstimatorHandle {
    inner: RwLock<Arc<EstimatorService>>,
}

impl EstimatorHandle {
    pub fn new(service: EstimatorService) -> Self {
        Self {
            inner: RwLock::new(Arc::new(service)),
        }
    }

    pub fn current(&self) -> Arc<EstimatorService> {
        let guard = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Publishes `service` and returns the one it replaced.
    pub fn swap(&self, service: EstimatorService) -> Arc<EstimatorService> {
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::mem::replace(&mut *guard, Arc::new(service));
        if let Some(artifact) = guard.artifact() {
            info!(
                "Published artifact {} ({})",
                artifact.metadata().artifact_id,
                artifact.family()
            );
        }
        previous
    }
}
