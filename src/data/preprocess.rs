// src/data/preprocess.rs
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::records::{HistoricalRecord, RawRecord};
use crate::errors::{EstimatorError, Result};
use crate::features::{AddressEncoder, FeatureVector};
use crate::utils::constants::{FEATURE_COUNT, IQR_MULTIPLIER};
use crate::utils::progress_bars::logging::{PipelineStage, TrainingLogger};

/// A cleaned training row with its derived columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub record: HistoricalRecord,
    /// Derived for analysis only, never a model input.
    pub price_per_sqm: f64,
    pub total_amenities: f64,
}

/// Inclusive Tukey fence on price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceFence {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl PriceFence {
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        let mut sorted = prices.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let q1 = quantile(&sorted, 0.25)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - IQR_MULTIPLIER * iqr,
            upper: q3 + IQR_MULTIPLIER * iqr,
        })
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.lower && price <= self.upper
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub rows: Vec<CleanRecord>,
    pub fence: PriceFence,
    pub raw_rows: usize,
    pub complete_rows: usize,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything the trainer needs: the matrix in `FEATURE_NAMES` order, the
/// target, the cleaned rows, and the encoder fitted over them.
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    pub features: Array2<f64>,
    pub target: Array1<f64>,
    pub training_set: TrainingSet,
    pub encoder: AddressEncoder,
}

/// Linear interpolation between order statistics of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn preprocess(records: &[RawRecord]) -> Result<PreprocessOutput> {
    let logger = TrainingLogger::new(PipelineStage::Preprocess);
    if records.is_empty() {
        return Err(EstimatorError::Data("dataset has no rows".to_string()));
    }
    logger.log_phase("Cleaning", Some(&format!("{} raw rows", records.len())));

    let complete: Vec<HistoricalRecord> = records.iter().filter_map(RawRecord::complete).collect();
    logger.log_row_counts("Drop incomplete rows", records.len(), complete.len());

    let prices: Vec<f64> = complete.iter().map(|r| r.price).collect();
    let fence = PriceFence::from_prices(&prices)
        .ok_or_else(|| EstimatorError::Data("no rows survived cleaning".to_string()))?;
    let fenced: Vec<HistoricalRecord> = complete
        .into_iter()
        .filter(|r| fence.contains(r.price))
        .collect();
    logger.log_row_counts("Drop price outliers", prices.len(), fenced.len());
    if fenced.is_empty() {
        return Err(EstimatorError::Data("no rows survived cleaning".to_string()));
    }

    let rows: Vec<CleanRecord> = fenced
        .into_iter()
        .map(|record| {
            let price_per_sqm = record.price / record.area;
            let total_amenities = record.amenity_flags().iter().sum();
            CleanRecord {
                record,
                price_per_sqm,
                total_amenities,
            }
        })
        .collect();

    let encoder = AddressEncoder::fit(rows.iter().map(|r| r.record.address.as_str()));
    logger.log_phase(
        "Encoding addresses",
        Some(&format!("{} distinct addresses", encoder.len())),
    );

    let mut features = Array2::<f64>::zeros((rows.len(), FEATURE_COUNT));
    let mut target = Array1::<f64>::zeros(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let r = &row.record;
        let [parking, warehouse, elevator] = r.amenity_flags();
        let vector = FeatureVector::new(
            r.area,
            r.rooms as f64,
            parking,
            warehouse,
            elevator,
            encoder.encode_or_sentinel(&r.address),
        );
        for (j, value) in vector.as_array().iter().enumerate() {
            features[[i, j]] = *value;
        }
        target[i] = r.price;
    }

    logger.log_completion(&format!("Prepared {} training rows", rows.len()));
    Ok(PreprocessOutput {
        features,
        target,
        training_set: TrainingSet {
            rows,
            fence,
            raw_rows: records.len(),
            complete_rows: prices.len(),
        },
        encoder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(area: f64, address: &str, price: f64) -> RawRecord {
        RawRecord::from(HistoricalRecord {
            area,
            rooms: 2,
            parking: true,
            warehouse: false,
            elevator: true,
            address: address.to_string(),
            price,
        })
    }

    #[test]
    fn test_quantile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.75), Some(3.25));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&[7.0], 0.25), Some(7.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_outliers_outside_fence_are_dropped() {
        let mut records: Vec<RawRecord> = (0..10)
            .map(|i| raw(50.0 + i as f64, "Punak", 1.0e9 + i as f64 * 1.0e7))
            .collect();
        records.push(raw(60.0, "Punak", 9.0e10));
        let out = preprocess(&records).unwrap();
        assert_eq!(out.training_set.len(), 10);
        for row in &out.training_set.rows {
            assert!(out.training_set.fence.contains(row.record.price));
        }
    }

    #[test]
    fn test_incomplete_rows_are_dropped_and_counted() {
        let mut records = vec![raw(50.0, "Punak", 1.0e9), raw(70.0, "Shahran", 2.0e9)];
        let mut broken = raw(60.0, "Tajrish", 1.5e9);
        broken.elevator = None;
        records.push(broken);
        let mut nan_area = raw(60.0, "Tajrish", 1.5e9);
        nan_area.area = Some(f64::NAN);
        records.push(nan_area);

        let out = preprocess(&records).unwrap();
        assert_eq!(out.training_set.raw_rows, 4);
        assert_eq!(out.training_set.complete_rows, 2);
        assert_eq!(out.encoder.classes(), &["Punak", "Shahran"]);
    }

    #[test]
    fn test_matrix_follows_feature_order() {
        let records = vec![raw(50.0, "Shahran", 1.0e9), raw(80.0, "Punak", 1.2e9)];
        let out = preprocess(&records).unwrap();
        assert_eq!(out.features.shape(), &[2, FEATURE_COUNT]);
        assert_eq!(
            out.features.row(0).to_vec(),
            vec![50.0, 2.0, 1.0, 0.0, 1.0, 1.0, 2.0]
        );
        assert_eq!(out.target.to_vec(), vec![1.0e9, 1.2e9]);
        assert_eq!(out.training_set.rows[0].price_per_sqm, 2.0e7);
    }

    #[test]
    fn test_empty_input_is_data_error() {
        assert!(matches!(preprocess(&[]), Err(EstimatorError::Data(_))));
    }

    #[test]
    fn test_all_rows_incomplete_is_data_error() {
        let records = vec![RawRecord::default(), RawRecord::default()];
        match preprocess(&records) {
            Err(EstimatorError::Data(msg)) => assert!(msg.contains("no rows survived")),
            other => panic!("unexpected result: {:?}", other.map(|o| o.target)),
        }
    }
}
