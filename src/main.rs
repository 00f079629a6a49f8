// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use estimator_lib::config::EstimatorConfig;
use estimator_lib::errors::EstimatorError;
use estimator_lib::features::RawFields;
use estimator_lib::service::EstimatorService;
use estimator_lib::utils::env::load_env;
use log::info;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

const CLOSEST_SPELLINGS: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "estimator", about = "Residential price estimates and address lookup")]
struct Cli {
    /// Artifact bundle to load, or to create when missing
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,
    /// Historical sales CSV
    #[arg(long, global = true)]
    data_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate the price of one property
    Predict {
        #[arg(long)]
        area: f64,
        #[arg(long, default_value_t = 0)]
        rooms: u32,
        #[arg(long)]
        parking: bool,
        #[arg(long)]
        warehouse: bool,
        #[arg(long)]
        elevator: bool,
        #[arg(long, default_value = "")]
        address: String,
    },
    /// Autocomplete an address
    Search { query: String },
    /// Resolve an address to its catalog spelling
    Validate { address: String },
    /// List every known address
    Addresses,
    /// Whole-corpus statistics
    Stats,
    /// Statistics for one exact address
    AddressStats { address: String },
    /// Retrain from the CSV and replace the bundle
    Train,
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", text);
    Ok(())
}

/// Input problems are reported as JSON on stdout with exit code 2; anything else aborts.
fn emit_result<T: Serialize>(result: estimator_lib::Result<T>) -> Result<()> {
    match result {
        Ok(value) => emit(&value),
        Err(e) if e.is_client_error() => {
            emit(&json!({ "success": false, "kind": e.kind(), "error": e.to_string() }))?;
            std::process::exit(2);
        }
        Err(e) => Err(e).context("Request failed"),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();

    let cli = Cli::parse();
    let mut config = EstimatorConfig::from_env();
    if let Some(path) = cli.model_path {
        config.model_path = path;
    }
    if let Some(path) = cli.data_path {
        config.data_path = path;
    }
    config.log_config();

    match cli.command {
        Command::Train => run_training(&config),
        Command::Predict {
            area,
            rooms,
            parking,
            warehouse,
            elevator,
            address,
        } => {
            let service = start_service(&config)?;
            let fields = RawFields::new(area, rooms, parking, warehouse, elevator, &address);
            emit_result(service.predict(&fields))
        }
        Command::Search { query } => {
            let service = start_service(&config)?;
            emit(&service.search_addresses(&query))
        }
        Command::Validate { address } => {
            let service = start_service(&config)?;
            match service.validate_address(&address) {
                Ok(validation) if !validation.valid => {
                    let closest: Vec<String> = service
                        .nearest_addresses(&address, CLOSEST_SPELLINGS)
                        .into_iter()
                        .map(|(entry, _)| entry)
                        .collect();
                    emit(&json!({ "validation": validation, "closest": closest }))
                }
                other => emit_result(other),
            }
        }
        Command::Addresses => {
            let service = start_service(&config)?;
            emit(&service.list_addresses())
        }
        Command::Stats => {
            let service = start_service(&config)?;
            emit(service.dataset_stats())
        }
        Command::AddressStats { address } => {
            let service = start_service(&config)?;
            emit_result(service.address_stats(&address))
        }
    }
}

fn start_service(config: &EstimatorConfig) -> Result<EstimatorService> {
    EstimatorService::initialize(config).context("Failed to initialize estimator")
}

fn run_training(config: &EstimatorConfig) -> Result<()> {
    let service = EstimatorService::retrain(config).context("Training failed")?;
    let artifact = service
        .artifact()
        .ok_or(EstimatorError::NotTrained)
        .context("Training produced no artifact")?;
    info!("Saved new model to {}", config.model_path.display());
    emit(&json!({
        "artifact_id": artifact.metadata().artifact_id,
        "params": artifact.metadata().params,
        "report": artifact.metadata().report,
    }))
}
