// src/features/scaler.rs
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::{EstimatorError, Result};

/// Zero-mean, unit-variance scaling fitted on the training split only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self> {
        let means = x.mean_axis(Axis(0)).ok_or_else(|| {
            EstimatorError::Training("cannot fit a scaler on zero rows".to_string())
        })?;
        let stds = x.std_axis(Axis(0), 0.0);
        // Constant columns pass through centred but unscaled.
        let scales = stds
            .iter()
            .map(|&s| if s == 0.0 || !s.is_finite() { 1.0 } else { s })
            .collect();
        Ok(Self {
            means: means.to_vec(),
            scales,
        })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for mut row in out.rows_mut() {
            for ((value, mean), scale) in row.iter_mut().zip(&self.means).zip(&self.scales) {
                *value = (*value - mean) / scale;
            }
        }
        out
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.means)
            .zip(&self.scales)
            .map(|((value, mean), scale)| (value - mean) / scale)
            .collect()
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_transform_centres_and_scales() {
        let x = array![[1.0, 10.0], [3.0, 10.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();
        let scaled = scaler.transform(x.view());
        assert_eq!(scaled, array![[-1.0, 0.0], [1.0, 0.0]]);
        assert_eq!(scaler.n_features(), 2);
    }

    #[test]
    fn test_transform_row_matches_matrix_transform() {
        let x = array![[1.0, 4.0], [2.0, 8.0], [6.0, 0.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();
        let scaled = scaler.transform(x.view());
        let row = scaler.transform_row(&[2.0, 8.0]);
        assert_eq!(row, scaled.row(1).to_vec());
    }

    #[test]
    fn test_fit_rejects_empty_input() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(x.view()).is_err());
    }
}
