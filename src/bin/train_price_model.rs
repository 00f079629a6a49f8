// src/bin/train_price_model.rs

use anyhow::{Context, Result};
use estimator_lib::{
    config::EstimatorConfig,
    data::{load_csv, preprocess},
    features::RawFields,
    model::{store, trainer::train_preprocessed, ModelArtifact},
    service::EstimatorService,
    utils::env::load_env,
};
use log::{info, warn};
use std::env;

fn print_training_summary(artifact: &ModelArtifact, saved_to: Option<&str>) {
    let metadata = artifact.metadata();
    let report = &metadata.report;
    println!("\n=== PRICE MODEL TRAINING SUMMARY ===");
    println!("Artifact ID: {}", metadata.artifact_id);
    println!("Trained At: {}", metadata.trained_at);
    println!("Selected Model: {}", artifact.family());
    println!("Hyperparameters: {}", metadata.params.describe());
    println!("Rows: {} train / {} test", report.train_rows, report.test_rows);

    println!("\nCross-validation R² by family:");
    for candidate in &report.candidate_scores {
        match (candidate.mean, candidate.std) {
            (Some(mean), Some(std)) => {
                println!("  {}: {:.4} (+/- {:.4})", candidate.family, mean, std * 2.0)
            }
            _ => println!("  {}: skipped", candidate.family),
        }
    }
    if let Some(score) = report.grid_best_score {
        println!(
            "Grid search: best R² {:.4} over {} configurations",
            score, report.grid_size
        );
    }

    println!("\nTest set:");
    println!("  R²:  {:.4}", report.test_metrics.r2);
    println!("  MSE: {:.2}", report.test_metrics.mse);
    println!("  MAE: {:.2}", report.test_metrics.mae);

    println!("\nFeature Importance:");
    for entry in &report.feature_importance {
        println!("  {}: {:.4}", entry.feature, entry.importance);
    }

    match saved_to {
        Some(path) => println!("\nModel saved to {}", path),
        None => println!("\nDry run: model was not saved."),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args: Vec<String> = env::args().collect();
    let dry_run = args.contains(&"--dry-run".to_string());
    if dry_run {
        warn!("DRY RUN MODE: the trained model will not be written to disk.");
    }

    let config = EstimatorConfig::from_env();
    config.log_config();

    let records = load_csv(&config.data_path)
        .with_context(|| format!("Failed to load {}", config.data_path.display()))?;
    let prepared = preprocess(&records).context("Failed to preprocess training data")?;
    info!(
        "Training on {} cleaned rows ({} distinct addresses)",
        prepared.training_set.len(),
        prepared.encoder.len()
    );
    let artifact =
        train_preprocessed(prepared, &config.training).context("Failed to train price model")?;

    let saved_to = if dry_run {
        None
    } else {
        store::save(&artifact, &config.model_path).with_context(|| {
            format!("Failed to save model to {}", config.model_path.display())
        })?;
        Some(config.model_path.display().to_string())
    };
    print_training_summary(&artifact, saved_to.as_deref());

    let service = EstimatorService::from_records(artifact, &records, config.currency_divisor);
    let sample = RawFields::new(100.0, 2, true, true, true, "Shahran");
    let estimate = service
        .predict(&sample)
        .context("Example prediction failed")?;
    println!("\nExample prediction (100 m², 2 rooms, all amenities, Shahran):");
    println!("  Predicted price: {:.0}", estimate.price);
    println!(
        "  Predicted price: {:.0} (÷{})",
        estimate.price_secondary, config.currency_divisor
    );
    Ok(())
}
