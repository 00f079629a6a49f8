// tests/pipeline.rs
use estimator_lib::config::{BoostingGrid, EstimatorConfig, ForestGrid, TrainingConfig};
use estimator_lib::data::{preprocess, read_records, RawRecord};
use estimator_lib::errors::EstimatorError;
use estimator_lib::features::RawFields;
use estimator_lib::model::{store, trainer, BoostingParams, ForestParams};
use estimator_lib::service::{EstimatorHandle, EstimatorService};
use estimator_lib::utils::progress_bars::progress_config::ProgressConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const ADDRESSES: [(&str, f64); 6] = [
    ("Shahran", 4.0e7),
    ("Shahrake Gharb", 9.0e7),
    ("Punak", 3.5e7),
    ("Pardis", 1.5e7),
    ("Tajrish", 1.1e8),
    ("Narmak", 4.5e7),
];

fn synthetic_csv(rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = String::from("Area,Room,Parking,Warehouse,Elevator,Address,Price\n");
    for _ in 0..rows {
        let (address, per_sqm) = ADDRESSES[rng.gen_range(0..ADDRESSES.len())];
        let area: f64 = rng.gen_range(40.0..180.0);
        let rooms: u32 = rng.gen_range(0..4);
        let parking = rng.gen_bool(0.6);
        let warehouse = rng.gen_bool(0.5);
        let elevator = rng.gen_bool(0.5);
        let amenities = [parking, warehouse, elevator].iter().filter(|b| **b).count() as f64;
        let noise: f64 = rng.gen_range(0.9..1.1);
        let price = per_sqm * area * (1.0 + 0.05 * amenities) * noise;
        csv.push_str(&format!(
            "{:.0},{},{},{},{},{},{:.0}\n",
            area, rooms, parking, warehouse, elevator, address, price
        ));
    }
    csv
}

fn narrow_training() -> TrainingConfig {
    TrainingConfig {
        cv_folds: 3,
        grid_folds: 2,
        max_parallelism: 2,
        candidate_forest: ForestParams {
            n_trees: 8,
            ..ForestParams::with_seed(42)
        },
        candidate_boosting: BoostingParams {
            n_trees: 15,
            ..BoostingParams::default()
        },
        forest_grid: ForestGrid {
            max_depth: vec![Some(6), None],
            min_samples_leaf: vec![1],
            min_samples_split: vec![2],
            n_trees: vec![8],
        },
        boosting_grid: BoostingGrid {
            learning_rate: vec![0.1],
            max_depth: vec![2, 3],
            n_trees: vec![15],
        },
        progress: ProgressConfig::disabled(),
        ..TrainingConfig::default()
    }
}

fn config_in(dir: &Path) -> EstimatorConfig {
    let data_path = dir.join("house.csv");
    fs::write(&data_path, synthetic_csv(120, 11)).unwrap();
    EstimatorConfig {
        data_path,
        model_path: dir.join("models").join("house_price_model.json"),
        currency_divisor: 30_000.0,
        training: narrow_training(),
    }
}

fn records() -> Vec<RawRecord> {
    read_records(synthetic_csv(120, 11).as_bytes()).unwrap()
}

#[test]
fn test_initialize_trains_then_reloads_identically() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    assert!(!config.model_path.exists());

    let trained = EstimatorService::initialize(&config).unwrap();
    assert!(config.model_path.exists());
    let reloaded = EstimatorService::initialize(&config).unwrap();

    let trained_id = trained.artifact().unwrap().metadata().artifact_id;
    let reloaded_id = reloaded.artifact().unwrap().metadata().artifact_id;
    assert_eq!(trained_id, reloaded_id);

    for (address, _) in ADDRESSES {
        let fields = RawFields::new(95.0, 2, true, false, true, address);
        let a = trained.predict(&fields).unwrap();
        let b = reloaded.predict(&fields).unwrap();
        assert_eq!(a.raw_price.to_bits(), b.raw_price.to_bits());
    }
}

#[test]
fn test_training_is_reproducible() {
    let first = trainer::train_preprocessed(preprocess(&records()).unwrap(), &narrow_training())
        .unwrap();
    let second = trainer::train_preprocessed(preprocess(&records()).unwrap(), &narrow_training())
        .unwrap();
    assert_eq!(first.family(), second.family());
    assert_eq!(first.metadata().params, second.metadata().params);
    let r2_first = first.metadata().report.test_metrics.r2;
    let r2_second = second.metadata().report.test_metrics.r2;
    assert!((r2_first - r2_second).abs() < 1e-9);
}

#[test]
fn test_predictions_are_never_negative() {
    let artifact =
        trainer::train_preprocessed(preprocess(&records()).unwrap(), &narrow_training()).unwrap();
    let service = EstimatorService::from_records(artifact, &records(), 30_000.0);
    for area in [0.0, 0.001, 1.0, -50.0] {
        let fields = RawFields::new(area, 0, false, false, false, "Pardis");
        let estimate = service.predict(&fields).unwrap();
        assert!(estimate.raw_price >= 0.0);
        assert!(estimate.price_secondary >= 0.0);
    }
}

#[test]
fn test_unseen_address_still_predicts() {
    let artifact =
        trainer::train_preprocessed(preprocess(&records()).unwrap(), &narrow_training()).unwrap();
    let service = EstimatorService::from_records(artifact, &records(), 30_000.0);
    let estimate = service
        .predict(&RawFields::new(80.0, 2, true, true, false, "Zzyzx Road"))
        .unwrap();
    assert!(estimate.raw_price.is_finite());
    assert!(estimate.raw_price >= 0.0);
    assert_eq!(estimate.address_used, "Zzyzx Road");
}

#[test]
fn test_predict_uses_canonical_address() {
    let artifact =
        trainer::train_preprocessed(preprocess(&records()).unwrap(), &narrow_training()).unwrap();
    let service = EstimatorService::from_records(artifact, &records(), 30_000.0);
    let lower = service
        .predict(&RawFields::new(80.0, 2, true, true, false, "  tajrish "))
        .unwrap();
    let exact = service
        .predict(&RawFields::new(80.0, 2, true, true, false, "Tajrish"))
        .unwrap();
    assert_eq!(lower.address_used, "Tajrish");
    assert_eq!(lower.raw_price.to_bits(), exact.raw_price.to_bits());
    assert_eq!(exact.price, exact.raw_price.round());
    assert_eq!(exact.price_secondary, (exact.raw_price / 30_000.0).round());
}

#[test]
fn test_address_lookups_through_service() {
    let artifact =
        trainer::train_preprocessed(preprocess(&records()).unwrap(), &narrow_training()).unwrap();
    let service = EstimatorService::from_records(artifact, &records(), 30_000.0);

    let listed = service.list_addresses();
    assert!(listed.windows(2).all(|w| w[0] < w[1]));

    let matches = service.search_addresses("shah");
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].address, "Shahrake Gharb");
    assert_eq!(matches[1].address, "Shahran");
    assert!(matches.iter().all(|m| m.score == 90));

    let validation = service.validate_address("SHAHRAN").unwrap();
    assert!(validation.valid);
    assert_eq!(validation.matched_address.as_deref(), Some("Shahran"));
    assert_eq!(validation.confidence, Some(100));

    let invalid = service.validate_address("xyz123").unwrap();
    assert!(!invalid.valid);
    assert_eq!(invalid.suggestions.unwrap(), listed[..5].to_vec());

    let err = service.validate_address("").unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn test_statistics_through_service() {
    let artifact =
        trainer::train_preprocessed(preprocess(&records()).unwrap(), &narrow_training()).unwrap();
    let service = EstimatorService::from_records(artifact, &records(), 30_000.0);

    let stats = service.dataset_stats();
    assert_eq!(stats.total_properties, 120);
    assert_eq!(stats.total_addresses, ADDRESSES.len());
    assert_eq!(stats.price_ranges.total(), 120);

    let punak = service.address_stats("Punak").unwrap();
    assert!(punak.count > 0);
    assert!(punak.price.min <= punak.price.mean && punak.price.mean <= punak.price.max);

    let err = service.address_stats("Nowhere").unwrap_err();
    assert!(matches!(err, EstimatorError::AddressNotFound(_)));
}

#[test]
fn test_handle_swap_publishes_new_service() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    let handle = EstimatorHandle::new(EstimatorService::initialize(&config).unwrap());

    let before = handle.current();
    let before_id = before.artifact().unwrap().metadata().artifact_id;

    let retrained = EstimatorService::retrain(&config).unwrap();
    let previous = handle.swap(retrained);
    let after = handle.current();
    let after_id = after.artifact().unwrap().metadata().artifact_id;

    assert_ne!(before_id, after_id);
    assert!(Arc::ptr_eq(&before, &previous));
    // Old readers keep a consistent view.
    let fields = RawFields::new(70.0, 1, false, true, true, "Narmak");
    assert!(before.predict(&fields).is_ok());

    let reloaded = store::load(&config.model_path).unwrap();
    assert_eq!(reloaded.metadata().artifact_id, after_id);
}

#[test]
fn test_corrupt_bundle_fails_startup() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    fs::create_dir_all(config.model_path.parent().unwrap()).unwrap();
    fs::write(&config.model_path, b"{\"format_version\":1}").unwrap();
    let err = EstimatorService::initialize(&config).unwrap_err();
    assert!(matches!(err, EstimatorError::Store(_)));
    assert!(!err.is_client_error());
}

#[test]
fn test_too_few_rows_is_training_error() {
    let csv = synthetic_csv(2, 3);
    let records = read_records(csv.as_bytes()).unwrap();
    let prepared = preprocess(&records).unwrap();
    let err = trainer::train_preprocessed(prepared, &narrow_training()).unwrap_err();
    assert!(matches!(err, EstimatorError::Training(_)));
}
