// src/model/trainer.rs
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::data::PreprocessOutput;
use crate::errors::{EstimatorError, Result};
use crate::features::{AddressEncoder, StandardScaler};
use crate::model::artifact::ModelArtifact;
use crate::model::metrics::{mean_and_std, r2_score, RegressionMetrics};
use crate::model::regressor::{FittedRegressor, ModelFamily, ModelParams};
use crate::utils::constants::{FEATURE_COUNT, FEATURE_NAMES};
use crate::utils::progress_bars::logging::{PipelineStage, TrainingLogger};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub family: ModelFamily,
    /// Mean CV R². None when the family failed or scored non-finite.
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Drop in test R² when the column is shuffled.
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub candidate_scores: Vec<CandidateScore>,
    pub selected_family: ModelFamily,
    pub grid_size: usize,
    pub grid_best_score: Option<f64>,
    pub test_metrics: RegressionMetrics,
    pub feature_importance: Vec<FeatureImportance>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Trains on the output of `data::preprocess`.
pub fn train_preprocessed(output: PreprocessOutput, config: &TrainingConfig) -> Result<ModelArtifact> {
    train(&output.features, &output.target, output.encoder, config)
}

/// Selects, tunes and fits a model, returning the finished artifact.
pub fn train(
    x: &Array2<f64>,
    y: &Array1<f64>,
    encoder: AddressEncoder,
    config: &TrainingConfig,
) -> Result<ModelArtifact> {
    let logger = TrainingLogger::new(PipelineStage::Train);
    validate_inputs(x, y, &encoder, config)?;

    logger.log_phase(
        "Splitting",
        Some(&format!(
            "{} rows, test fraction {}, seed {}",
            x.nrows(),
            config.test_fraction,
            config.seed
        )),
    );
    let (train_idx, test_idx) = split_indices(x.nrows(), config.test_fraction, config.seed);
    if train_idx.len() < config.cv_folds {
        return Err(EstimatorError::Training(format!(
            "{} training rows after the split is fewer than {} folds",
            train_idx.len(),
            config.cv_folds
        )));
    }
    let x_train = x.select(Axis(0), &train_idx);
    let y_train = y.select(Axis(0), &train_idx);
    let x_test = x.select(Axis(0), &test_idx);
    let y_test = y.select(Axis(0), &test_idx);

    let scaler = StandardScaler::fit(x_train.view())?;
    let x_train_scaled = scaler.transform(x_train.view());
    let x_test_scaled = scaler.transform(x_test.view());
    let train_view =
        |family: ModelFamily| view_for(family, &x_train, &x_train_scaled);

    // Candidate round
    logger.log_phase(
        "Candidate selection",
        Some(&format!("{}-fold cross-validation", config.cv_folds)),
    );
    let candidate_bar = config
        .progress
        .create_bar(ModelFamily::ALL.len() as u64, "Cross-validating candidates");
    let mut candidate_scores = Vec::with_capacity(ModelFamily::ALL.len());
    let mut best: Option<(ModelParams, f64)> = None;
    for family in ModelFamily::ALL {
        let params = candidate_params(family, config);
        let score = cross_val_scores(&params, train_view(family), y_train.view(), config.cv_folds)
            .map(|scores| mean_and_std(&scores));
        if let Some(pb) = &candidate_bar {
            pb.inc(1);
        }
        match score {
            Ok((mean, std)) if mean.is_finite() => {
                logger.log_candidate_score(family, mean, std);
                candidate_scores.push(CandidateScore {
                    family,
                    mean: Some(mean),
                    std: Some(std),
                });
                if best.map_or(true, |(_, best_score)| mean > best_score) {
                    best = Some((params, mean));
                }
            }
            Ok(_) => {
                logger.log_candidate_skipped(family, "non-finite cross-validation score");
                candidate_scores.push(CandidateScore {
                    family,
                    mean: None,
                    std: None,
                });
            }
            Err(e) => {
                logger.log_candidate_skipped(family, &e.to_string());
                candidate_scores.push(CandidateScore {
                    family,
                    mean: None,
                    std: None,
                });
            }
        }
    }
    if let Some(pb) = candidate_bar {
        pb.finish_with_message("Candidates scored");
    }
    let (candidate, candidate_score) = best.ok_or_else(|| {
        EstimatorError::Training("every candidate model failed cross-validation".to_string())
    })?;
    let family = candidate.family();
    info!(
        "Selected {} with cross-validation R² {:.4}",
        family, candidate_score
    );

    // Grid search
    let grid = match family {
        ModelFamily::RandomForest => config.forest_grid.expand(config.seed),
        ModelFamily::GradientBoosting => config.boosting_grid.expand(),
        ModelFamily::Linear => Vec::new(),
    };
    let (tuned, grid_best_score) = if grid.is_empty() {
        debug!("No hyperparameter grid for {}, keeping candidate parameters", family);
        (candidate, None)
    } else {
        logger.log_phase(
            "Grid search",
            Some(&format!(
                "{} configurations, {}-fold cross-validation",
                grid.len(),
                config.grid_folds
            )),
        );
        match grid_search(&grid, train_view(family), y_train.view(), config, &logger)? {
            Some((params, score)) => (params, Some(score)),
            None => {
                warn!(
                    "Every grid configuration for {} scored non-finite, keeping candidate parameters",
                    family
                );
                (candidate, None)
            }
        }
    };
    info!("Tuned parameters: {}", tuned.describe());

    // Final fit and evaluation
    logger.log_phase("Final fit", Some(&tuned.describe()));
    let regressor = tuned.fit(train_view(family), y_train.view())?;
    let test_view = view_for(family, &x_test, &x_test_scaled);
    let predictions = regressor.predict(test_view)?;
    if predictions.iter().any(|p| !p.is_finite()) {
        return Err(EstimatorError::Training(
            "final model produced non-finite test predictions".to_string(),
        ));
    }
    let y_test_vec = y_test.to_vec();
    let test_metrics = RegressionMetrics::evaluate(&y_test_vec, &predictions);
    logger.log_final_metrics(family, &test_metrics);

    let feature_importance =
        permutation_importance(&regressor, test_view, &y_test_vec, test_metrics.r2, config.seed)?;

    let report = TrainingReport {
        candidate_scores,
        selected_family: family,
        grid_size: grid.len(),
        grid_best_score,
        test_metrics,
        feature_importance,
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
    };
    logger.log_completion(&format!("Trained {}", family));
    Ok(ModelArtifact::new(regressor, scaler, encoder, tuned, report))
}

fn validate_inputs(
    x: &Array2<f64>,
    y: &Array1<f64>,
    encoder: &AddressEncoder,
    config: &TrainingConfig,
) -> Result<()> {
    if x.ncols() != FEATURE_COUNT {
        return Err(EstimatorError::Training(format!(
            "expected {} feature columns, got {}",
            FEATURE_COUNT,
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(EstimatorError::Training(format!(
            "feature matrix has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    if config.cv_folds < 2 || config.grid_folds < 2 {
        return Err(EstimatorError::Training(
            "cross-validation needs at least 2 folds".to_string(),
        ));
    }
    if x.nrows() < config.cv_folds {
        return Err(EstimatorError::Training(format!(
            "{} rows is fewer than {} folds",
            x.nrows(),
            config.cv_folds
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(EstimatorError::Training(
            "training data contains non-finite values".to_string(),
        ));
    }
    if encoder.is_empty() {
        return Err(EstimatorError::Training(
            "address encoder has an empty vocabulary".to_string(),
        ));
    }
    Ok(())
}

fn view_for<'a>(
    family: ModelFamily,
    raw: &'a Array2<f64>,
    scaled: &'a Array2<f64>,
) -> ArrayView2<'a, f64> {
    if family.requires_scaling() {
        scaled.view()
    } else {
        raw.view()
    }
}

fn candidate_params(family: ModelFamily, config: &TrainingConfig) -> ModelParams {
    match family {
        ModelFamily::RandomForest => ModelParams::RandomForest(config.candidate_forest),
        ModelFamily::GradientBoosting => ModelParams::GradientBoosting(config.candidate_boosting),
        ModelFamily::Linear => ModelParams::Linear,
    }
}

/// Seeded shuffle split. The first `ceil(n * test_fraction)` shuffled indices form the test set.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let test_len = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n.saturating_sub(1).max(1));
    let train = indices.split_off(test_len.min(n));
    (train, indices)
}

/// Contiguous, unshuffled fold boundaries; the first `n % k` folds take one extra row.
pub fn fold_ranges(n: usize, k: usize) -> Vec<std::ops::Range<usize>> {
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|fold| {
            let len = base + usize::from(fold < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// R² of each fold when fitting on the remaining folds.
pub fn cross_val_scores(
    params: &ModelParams,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    folds: usize,
) -> Result<Vec<f64>> {
    let n = x.nrows();
    if folds < 2 || n < folds {
        return Err(EstimatorError::Training(format!(
            "cannot run {}-fold cross-validation on {} rows",
            folds, n
        )));
    }
    fold_ranges(n, folds)
        .into_iter()
        .map(|holdout| {
            let train_rows: Vec<usize> = (0..n).filter(|i| !holdout.contains(i)).collect();
            let test_rows: Vec<usize> = holdout.collect();
            let model = params.fit(
                x.select(Axis(0), &train_rows).view(),
                y.select(Axis(0), &train_rows).view(),
            )?;
            let predictions = model.predict(x.select(Axis(0), &test_rows).view())?;
            Ok(r2_score(&y.select(Axis(0), &test_rows).to_vec(), &predictions))
        })
        .collect()
}

/// Scores every configuration on a bounded pool; the first configuration wins ties.
fn grid_search(
    grid: &[ModelParams],
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    config: &TrainingConfig,
    logger: &TrainingLogger,
) -> Result<Option<(ModelParams, f64)>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_parallelism.max(1))
        .build()
        .map_err(|e| EstimatorError::Training(format!("failed to build thread pool: {}", e)))?;
    let bar = if config.progress.should_show_detailed() {
        config.progress.create_bar(grid.len() as u64, "Grid search")
    } else {
        None
    };

    let scores: Vec<f64> = pool.install(|| {
        grid.par_iter()
            .map(|params| {
                let score = match cross_val_scores(params, x, y, config.grid_folds) {
                    Ok(scores) => mean_and_std(&scores).0,
                    Err(e) => {
                        debug!("Grid configuration {} failed: {}", params.describe(), e);
                        f64::NAN
                    }
                };
                if let Some(pb) = &bar {
                    pb.inc(1);
                }
                score
            })
            .collect()
    });
    if let Some(pb) = bar {
        pb.finish_with_message("Grid search complete");
    }

    let mut best: Option<(ModelParams, f64)> = None;
    for (index, (params, score)) in grid.iter().zip(&scores).enumerate() {
        logger.log_grid_config(index, grid.len(), &params.describe(), *score);
        if score.is_finite() && best.map_or(true, |(_, best_score)| *score > best_score) {
            best = Some((*params, *score));
        }
    }
    Ok(best)
}

/// Drop in R² per shuffled feature column, sorted descending.
fn permutation_importance(
    regressor: &FittedRegressor,
    x: ArrayView2<f64>,
    y: &[f64],
    baseline_r2: f64,
    seed: u64,
) -> Result<Vec<FeatureImportance>> {
    let mut importances = Vec::with_capacity(FEATURE_COUNT);
    for (j, name) in FEATURE_NAMES.iter().enumerate() {
        let mut permuted = x.to_owned();
        let mut column = x.column(j).to_vec();
        column.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(j as u64)));
        for (i, value) in column.into_iter().enumerate() {
            permuted[[i, j]] = value;
        }
        let predictions = regressor.predict(permuted.view())?;
        let importance = baseline_r2 - r2_score(y, &predictions);
        importances.push(FeatureImportance {
            feature: name.to_string(),
            importance: if importance.is_finite() { importance } else { 0.0 },
        });
    }
    importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(importances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoostingGrid, ForestGrid};
    use crate::model::regressor::ForestParams;
    use crate::utils::progress_bars::progress_config::ProgressConfig;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            cv_folds: 3,
            grid_folds: 2,
            max_parallelism: 2,
            candidate_forest: ForestParams {
                n_trees: 10,
                ..ForestParams::with_seed(42)
            },
            forest_grid: ForestGrid {
                max_depth: vec![Some(4), None],
                min_samples_leaf: vec![1],
                min_samples_split: vec![2],
                n_trees: vec![10],
            },
            boosting_grid: BoostingGrid {
                learning_rate: vec![0.1],
                max_depth: vec![2, 3],
                n_trees: vec![10],
            },
            progress: ProgressConfig::disabled(),
            ..TrainingConfig::default()
        }
    }

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>, AddressEncoder) {
        let encoder = AddressEncoder::fit(["Punak", "Shahran", "Tajrish"]);
        let mut x = Array2::<f64>::zeros((n, FEATURE_COUNT));
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let area = 40.0 + (i * 7 % 90) as f64;
            let rooms = (i % 4) as f64;
            let parking = (i % 2) as f64;
            let warehouse = ((i / 2) % 2) as f64;
            let elevator = ((i / 3) % 2) as f64;
            let address = (i % 3) as f64;
            let row = [
                area,
                rooms,
                parking,
                warehouse,
                elevator,
                address,
                parking + warehouse + elevator,
            ];
            for (j, v) in row.iter().enumerate() {
                x[[i, j]] = *v;
            }
            y[i] = 3.0e7 * area + 2.0e8 * parking + 1.0e8 * address + 5.0e8;
        }
        (x, y, encoder)
    }

    #[test]
    fn test_fold_ranges_cover_rows_contiguously() {
        let folds = fold_ranges(11, 3);
        assert_eq!(folds, vec![0..4, 4..8, 8..11]);
        let folds = fold_ranges(9, 3);
        assert_eq!(folds, vec![0..3, 3..6, 6..9]);
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let (train_a, test_a) = split_indices(50, 0.2, 42);
        let (train_b, test_b) = split_indices(50, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 10);
        assert_eq!(train_a.len(), 40);
        assert!(test_a.iter().all(|i| !train_a.contains(i)));
    }

    #[test]
    fn test_split_rounds_test_size_up() {
        let (train, test) = split_indices(11, 0.2, 1);
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn test_cross_val_rejects_too_few_rows() {
        let (x, y, _) = linear_data(3);
        let err = cross_val_scores(&ModelParams::Linear, x.view(), y.view(), 5).unwrap_err();
        assert!(matches!(err, EstimatorError::Training(_)));
    }

    #[test]
    fn test_train_rejects_fewer_rows_than_folds() {
        let (x, y, encoder) = linear_data(2);
        let err = train(&x, &y, encoder, &small_config()).unwrap_err();
        assert!(matches!(err, EstimatorError::Training(_)));
    }

    #[test]
    fn test_train_on_linear_target_reports_every_candidate() {
        let (x, y, encoder) = linear_data(60);
        let artifact = train(&x, &y, encoder, &small_config()).unwrap();
        let report = &artifact.metadata().report;
        assert_eq!(report.candidate_scores.len(), 3);
        assert_eq!(report.train_rows + report.test_rows, 60);
        assert_eq!(report.feature_importance.len(), FEATURE_COUNT);
        assert_eq!(report.selected_family, artifact.family());
        assert!(report.test_metrics.r2 > 0.5);
        let importances: Vec<f64> = report.feature_importance.iter().map(|f| f.importance).collect();
        assert!(importances.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_training_is_deterministic() {
        let (x, y, encoder) = linear_data(45);
        let first = train(&x, &y, encoder.clone(), &small_config()).unwrap();
        let second = train(&x, &y, encoder, &small_config()).unwrap();
        assert_eq!(first.family(), second.family());
        assert_eq!(first.metadata().params, second.metadata().params);
        let (r2_a, r2_b) = (
            first.metadata().report.test_metrics.r2,
            second.metadata().report.test_metrics.r2,
        );
        assert!((r2_a - r2_b).abs() < 1e-9);
    }
}
