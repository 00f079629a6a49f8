// src/model/regressor.rs
use log::debug;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;

use crate::errors::{EstimatorError, Result};

type Matrix = DenseMatrix<f64>;
type LinearModel = LinearRegression<f64, f64, Matrix, Vec<f64>>;
type ForestModel = RandomForestRegressor<f64, f64, Matrix, Vec<f64>>;
type TreeModel = DecisionTreeRegressor<f64, f64, Matrix, Vec<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    Linear,
}

impl ModelFamily {
    /// Candidate order. Selection keeps the first family on equal scores.
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::Linear,
    ];

    /// Linear models see standardized features; tree ensembles see raw ones.
    pub fn requires_scaling(self) -> bool {
        matches!(self, ModelFamily::Linear)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::RandomForest => write!(f, "RandomForest"),
            ModelFamily::GradientBoosting => write!(f, "GradientBoosting"),
            ModelFamily::Linear => write!(f, "LinearRegression"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// None grows trees until leaves are pure.
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl ForestParams {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_trees: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            learning_rate: 0.1,
            max_depth: 3,
        }
    }
}

/// Hyperparameters of one model family, fit through a single entry point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelParams {
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
    Linear,
}

impl ModelParams {
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelParams::RandomForest(_) => ModelFamily::RandomForest,
            ModelParams::GradientBoosting(_) => ModelFamily::GradientBoosting,
            ModelParams::Linear => ModelFamily::Linear,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ModelParams::RandomForest(p) => format!(
                "n_trees={}, max_depth={}, min_samples_split={}, min_samples_leaf={}",
                p.n_trees,
                p.max_depth
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "None".to_string()),
                p.min_samples_split,
                p.min_samples_leaf
            ),
            ModelParams::GradientBoosting(p) => format!(
                "n_trees={}, learning_rate={}, max_depth={}",
                p.n_trees, p.learning_rate, p.max_depth
            ),
            ModelParams::Linear => "ordinary least squares (SVD)".to_string(),
        }
    }

    pub fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<FittedRegressor> {
        let family = self.family();
        let matrix = to_dense(x)?;
        let target = y.to_vec();
        debug!(
            "Fitting {} on {} rows ({})",
            family,
            target.len(),
            self.describe()
        );
        match self {
            ModelParams::Linear => {
                let params =
                    LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::SVD);
                let model = LinearRegression::fit(&matrix, &target, params)
                    .map_err(|e| fit_failed(family, e))?;
                Ok(FittedRegressor::Linear(model))
            }
            ModelParams::RandomForest(p) => {
                let mut params = RandomForestRegressorParameters::default()
                    .with_n_trees(p.n_trees)
                    .with_min_samples_split(p.min_samples_split)
                    .with_min_samples_leaf(p.min_samples_leaf)
                    .with_m(x.ncols())
                    .with_seed(p.seed);
                if let Some(depth) = p.max_depth {
                    params = params.with_max_depth(depth);
                }
                let model = RandomForestRegressor::fit(&matrix, &target, params)
                    .map_err(|e| fit_failed(family, e))?;
                Ok(FittedRegressor::RandomForest(model))
            }
            ModelParams::GradientBoosting(p) => Ok(FittedRegressor::GradientBoosting(
                GradientBoostedTrees::fit(&matrix, &target, p)?,
            )),
        }
    }
}

/// Least-squares gradient boosting over smartcore regression trees.
#[derive(Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    initial_prediction: f64,
    learning_rate: f64,
    trees: Vec<TreeModel>,
}

impl GradientBoostedTrees {
    fn fit(x: &Matrix, y: &[f64], params: &BoostingParams) -> Result<Self> {
        if y.is_empty() {
            return Err(EstimatorError::Training(
                "gradient boosting needs at least one row".to_string(),
            ));
        }
        let initial_prediction = y.iter().sum::<f64>() / y.len() as f64;
        let mut current = vec![initial_prediction; y.len()];
        let mut trees = Vec::with_capacity(params.n_trees);

        for _ in 0..params.n_trees {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            let tree_params =
                DecisionTreeRegressorParameters::default().with_max_depth(params.max_depth);
            let tree = DecisionTreeRegressor::fit(x, &residuals, tree_params)
                .map_err(|e| fit_failed(ModelFamily::GradientBoosting, e))?;
            let update = tree
                .predict(x)
                .map_err(|e| predict_failed(ModelFamily::GradientBoosting, e))?;
            for (c, u) in current.iter_mut().zip(update) {
                *c += params.learning_rate * u;
            }
            trees.push(tree);
        }

        Ok(Self {
            initial_prediction,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    fn predict(&self, x: &Matrix, rows: usize) -> Result<Vec<f64>> {
        let mut out = vec![self.initial_prediction; rows];
        for tree in &self.trees {
            let update = tree
                .predict(x)
                .map_err(|e| predict_failed(ModelFamily::GradientBoosting, e))?;
            for (o, u) in out.iter_mut().zip(update) {
                *o += self.learning_rate * u;
            }
        }
        Ok(out)
    }
}

/// A fitted model of one of the supported families.
#[derive(Serialize, Deserialize)]
#[serde(tag = "family", content = "model", rename_all = "snake_case")]
pub enum FittedRegressor {
    RandomForest(ForestModel),
    GradientBoosting(GradientBoostedTrees),
    Linear(LinearModel),
}

impl FittedRegressor {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedRegressor::RandomForest(_) => ModelFamily::RandomForest,
            FittedRegressor::GradientBoosting(_) => ModelFamily::GradientBoosting,
            FittedRegressor::Linear(_) => ModelFamily::Linear,
        }
    }

    /// Predicts one value per row of `x`. Rows must already be scaled when the family requires it.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        let matrix = to_dense(x)?;
        let family = self.family();
        match self {
            FittedRegressor::Linear(model) => {
                model.predict(&matrix).map_err(|e| predict_failed(family, e))
            }
            FittedRegressor::RandomForest(model) => {
                model.predict(&matrix).map_err(|e| predict_failed(family, e))
            }
            FittedRegressor::GradientBoosting(model) => model.predict(&matrix, x.nrows()),
        }
    }
}

impl fmt::Debug for FittedRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedRegressor")
            .field("family", &self.family())
            .finish()
    }
}

fn to_dense(x: ArrayView2<f64>) -> Result<Matrix> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(EstimatorError::Training(format!(
            "cannot build a feature matrix of shape {}x{}",
            x.nrows(),
            x.ncols()
        )));
    }
    let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|row| row.to_vec()).collect();
    Ok(DenseMatrix::from_2d_vec(&rows))
}

fn fit_failed(family: ModelFamily, err: smartcore::error::Failed) -> EstimatorError {
    EstimatorError::Training(format!("{} fit failed: {}", family, err))
}

fn predict_failed(family: ModelFamily, err: smartcore::error::Failed) -> EstimatorError {
    EstimatorError::Training(format!("{} prediction failed: {}", family, err))
}
