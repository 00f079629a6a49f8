// src/data/mod.rs
pub mod preprocess;
pub mod records;
pub mod stats;

pub use preprocess::{preprocess, CleanRecord, PreprocessOutput, PriceFence, TrainingSet};
pub use records::{load_csv, read_records, HistoricalRecord, RawRecord};
pub use stats::{AddressStats, DatasetStats, PriceHistogram, PriceSummary};
