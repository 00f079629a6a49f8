// src/data/stats.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::records::HistoricalRecord;
use crate::errors::{EstimatorError, Result};
use crate::utils::constants::PRICE_BUCKET_BREAKPOINTS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl PriceSummary {
    fn from_prices<'a, I: IntoIterator<Item = &'a f64>>(prices: I) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &p in prices {
            count += 1;
            sum += p;
            min = min.min(p);
            max = max.max(p);
        }
        (count > 0).then(|| Self {
            min,
            mean: sum / count as f64,
            max,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistogram {
    #[serde(rename = "under_1b")]
    pub under_1b: usize,
    #[serde(rename = "1b_to_5b")]
    pub from_1b_to_5b: usize,
    #[serde(rename = "5b_to_10b")]
    pub from_5b_to_10b: usize,
    #[serde(rename = "over_10b")]
    pub over_10b: usize,
}

impl PriceHistogram {
    pub fn add(&mut self, price: f64) {
        let [one_b, five_b, ten_b] = PRICE_BUCKET_BREAKPOINTS;
        if price < one_b {
            self.under_1b += 1;
        } else if price < five_b {
            self.from_1b_to_5b += 1;
        } else if price < ten_b {
            self.from_5b_to_10b += 1;
        } else {
            self.over_10b += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.under_1b + self.from_1b_to_5b + self.from_5b_to_10b + self.over_10b
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_properties: usize,
    /// None for an empty corpus.
    pub price: Option<PriceSummary>,
    pub avg_area: Option<f64>,
    pub total_addresses: usize,
    pub price_ranges: PriceHistogram,
}

impl DatasetStats {
    pub fn compute(records: &[HistoricalRecord]) -> Self {
        let mut price_ranges = PriceHistogram::default();
        for record in records {
            price_ranges.add(record.price);
        }
        let addresses: BTreeSet<&str> = records.iter().map(|r| r.address.as_str()).collect();
        Self {
            total_properties: records.len(),
            price: PriceSummary::from_prices(records.iter().map(|r| &r.price)),
            avg_area: mean(records.iter().map(|r| r.area)),
            total_addresses: addresses.len(),
            price_ranges,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressStats {
    pub address: String,
    pub count: usize,
    pub price: PriceSummary,
    pub avg_area: f64,
    pub avg_rooms: f64,
}

impl AddressStats {
    /// Statistics over records whose address is byte-identical to `address`.
    pub fn compute(records: &[HistoricalRecord], address: &str) -> Result<Self> {
        let matching: Vec<&HistoricalRecord> =
            records.iter().filter(|r| r.address == address).collect();
        let price = PriceSummary::from_prices(matching.iter().map(|r| &r.price))
            .ok_or_else(|| EstimatorError::AddressNotFound(address.to_string()))?;
        Ok(Self {
            address: address.to_string(),
            count: matching.len(),
            price,
            avg_area: mean(matching.iter().map(|r| r.area)).unwrap_or(0.0),
            avg_rooms: mean(matching.iter().map(|r| r.rooms as f64)).unwrap_or(0.0),
        })
    }
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (count, sum) = values.fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    (count > 0).then(|| sum / count as f64)
}
