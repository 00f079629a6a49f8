// src/utils/constants.rs

/// Column order shared by training and inference. Any change invalidates persisted artifacts.
pub const FEATURE_NAMES: [&str; 7] = [
    "Area",
    "Room",
    "Parking",
    "Warehouse",
    "Elevator",
    "Address_encoded",
    "Total_amenities",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Code assigned to any address missing from the fitted vocabulary.
pub const UNSEEN_ADDRESS_CODE: usize = 0;

/// Tukey fence multiplier for price outlier removal.
pub const IQR_MULTIPLIER: f64 = 1.5;

/// 1 unit of secondary currency = 30,000 units of primary currency.
pub const DEFAULT_CURRENCY_DIVISOR: f64 = 30_000.0;

pub const SCORE_EXACT: u8 = 100;
pub const SCORE_PREFIX: u8 = 90;
pub const SCORE_SUBSTRING: u8 = 70;
pub const SCORE_WORD_PREFIX: u8 = 60;
/// Lowest score `validate` accepts as a match.
pub const MIN_VALID_CONFIDENCE: u8 = SCORE_WORD_PREFIX;
pub const MAX_SEARCH_RESULTS: usize = 10;
pub const MAX_FALLBACK_SUGGESTIONS: usize = 5;

/// Price histogram breakpoints, in primary currency units.
pub const PRICE_BUCKET_BREAKPOINTS: [f64; 3] = [1e9, 5e9, 1e10];
