// src/config.rs
use log::info;
use std::env;
use std::path::PathBuf;

use crate::model::regressor::{BoostingParams, ForestParams, ModelParams};
use crate::utils::constants::DEFAULT_CURRENCY_DIVISOR;
use crate::utils::progress_bars::progress_config::ProgressConfig;

/// Random forest search space. `expand` enumerates it with keys in
/// alphabetical order and the last key varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestGrid {
    pub max_depth: Vec<Option<u16>>,
    pub min_samples_leaf: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub n_trees: Vec<usize>,
}

impl Default for ForestGrid {
    fn default() -> Self {
        Self {
            max_depth: vec![Some(10), Some(20), None],
            min_samples_leaf: vec![1, 2],
            min_samples_split: vec![2, 5],
            n_trees: vec![100, 200],
        }
    }
}

impl ForestGrid {
    pub fn expand(&self, seed: u64) -> Vec<ModelParams> {
        let mut out = Vec::with_capacity(self.len());
        for &max_depth in &self.max_depth {
            for &min_samples_leaf in &self.min_samples_leaf {
                for &min_samples_split in &self.min_samples_split {
                    for &n_trees in &self.n_trees {
                        out.push(ModelParams::RandomForest(ForestParams {
                            n_trees,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                            seed,
                        }));
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.max_depth.len()
            * self.min_samples_leaf.len()
            * self.min_samples_split.len()
            * self.n_trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Gradient boosting search space, enumerated like `ForestGrid`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostingGrid {
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<u16>,
    pub n_trees: Vec<usize>,
}

impl Default for BoostingGrid {
    fn default() -> Self {
        Self {
            learning_rate: vec![0.05, 0.1, 0.15],
            max_depth: vec![3, 5, 7],
            n_trees: vec![100, 200],
        }
    }
}

impl BoostingGrid {
    pub fn expand(&self) -> Vec<ModelParams> {
        let mut out = Vec::with_capacity(self.len());
        for &learning_rate in &self.learning_rate {
            for &max_depth in &self.max_depth {
                for &n_trees in &self.n_trees {
                    out.push(ModelParams::GradientBoosting(BoostingParams {
                        n_trees,
                        learning_rate,
                        max_depth,
                    }));
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.learning_rate.len() * self.max_depth.len() * self.n_trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split, cross-validation and search settings for one training run.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub seed: u64,
    pub test_fraction: f64,
    pub cv_folds: usize,
    pub grid_folds: usize,
    pub max_parallelism: usize,
    /// Hyperparameters used in the candidate round.
    pub candidate_forest: ForestParams,
    pub candidate_boosting: BoostingParams,
    pub forest_grid: ForestGrid,
    pub boosting_grid: BoostingGrid,
    pub progress: ProgressConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let seed = 42;
        Self {
            seed,
            test_fraction: 0.2,
            cv_folds: 5,
            grid_folds: 3,
            max_parallelism: num_cpus::get(),
            candidate_forest: ForestParams::with_seed(seed),
            candidate_boosting: BoostingParams::default(),
            forest_grid: ForestGrid::default(),
            boosting_grid: BoostingGrid::default(),
            progress: ProgressConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let seed = env::var("ESTIMATOR_RANDOM_SEED")
            .unwrap_or_else(|_| defaults.seed.to_string())
            .parse::<u64>()
            .unwrap_or(defaults.seed);
        let test_fraction = env::var("ESTIMATOR_TEST_FRACTION")
            .unwrap_or_else(|_| defaults.test_fraction.to_string())
            .parse::<f64>()
            .ok()
            .filter(|f| *f > 0.0 && *f < 1.0)
            .unwrap_or(defaults.test_fraction);
        let cv_folds = env::var("ESTIMATOR_CV_FOLDS")
            .unwrap_or_else(|_| defaults.cv_folds.to_string())
            .parse::<usize>()
            .unwrap_or(defaults.cv_folds);
        let grid_folds = env::var("ESTIMATOR_GRID_FOLDS")
            .unwrap_or_else(|_| defaults.grid_folds.to_string())
            .parse::<usize>()
            .unwrap_or(defaults.grid_folds);
        let max_parallelism = env::var("ESTIMATOR_MAX_PARALLELISM")
            .unwrap_or_else(|_| defaults.max_parallelism.to_string())
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_parallelism);

        Self {
            seed,
            test_fraction,
            cv_folds,
            grid_folds,
            max_parallelism,
            candidate_forest: ForestParams::with_seed(seed),
            progress: ProgressConfig::from_env(),
            ..defaults
        }
    }

    pub fn log_config(&self) {
        info!("🤖 Training configuration");
        info!(
            "   Seed: {}, test fraction: {}, CV folds: {}, grid folds: {}",
            self.seed, self.test_fraction, self.cv_folds, self.grid_folds
        );
        info!(
            "   Grid sizes: forest {}, boosting {}, parallelism {}",
            self.forest_grid.len(),
            self.boosting_grid.len(),
            self.max_parallelism
        );
    }
}

/// Runtime configuration shared by the binaries.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    pub currency_divisor: f64,
    pub training: TrainingConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("house_cleaned.csv"),
            model_path: PathBuf::from("house_price_model.json"),
            currency_divisor: DEFAULT_CURRENCY_DIVISOR,
            training: TrainingConfig::default(),
        }
    }
}

impl EstimatorConfig {
    pub fn from_env() -> Self {
        let data_path = env::var("ESTIMATOR_DATA_PATH")
            .unwrap_or_else(|_| "house_cleaned.csv".to_string());
        let model_path = env::var("ESTIMATOR_MODEL_PATH")
            .unwrap_or_else(|_| "house_price_model.json".to_string());
        let currency_divisor = env::var("ESTIMATOR_CURRENCY_DIVISOR")
            .unwrap_or_else(|_| DEFAULT_CURRENCY_DIVISOR.to_string())
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(DEFAULT_CURRENCY_DIVISOR);

        Self {
            data_path: PathBuf::from(data_path),
            model_path: PathBuf::from(model_path),
            currency_divisor,
            training: TrainingConfig::from_env(),
        }
    }

    pub fn log_config(&self) {
        info!("🏠 Estimator configuration");
        info!("   Data path: {}", self.data_path.display());
        info!("   Model path: {}", self.model_path.display());
        info!("   Currency divisor: {}", self.currency_divisor);
        self.training.log_config();
    }
}
