// src/data/records.rs
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::errors::{EstimatorError, Result};

/// Header names of the historical corpus.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "Area",
    "Room",
    "Parking",
    "Warehouse",
    "Elevator",
    "Address",
    "Price",
];

/// One CSV row before cleaning. Missing or unparseable cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub area: Option<f64>,
    pub rooms: Option<f64>,
    pub parking: Option<f64>,
    pub warehouse: Option<f64>,
    pub elevator: Option<f64>,
    pub address: Option<String>,
    pub price: Option<f64>,
}

/// A complete historical sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub area: f64,
    pub rooms: u32,
    pub parking: bool,
    pub warehouse: bool,
    pub elevator: bool,
    pub address: String,
    pub price: f64,
}

impl HistoricalRecord {
    pub fn amenity_flags(&self) -> [f64; 3] {
        [
            flag(self.parking),
            flag(self.warehouse),
            flag(self.elevator),
        ]
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl RawRecord {
    /// The typed record if every field is present, finite, and in range.
    pub fn complete(&self) -> Option<HistoricalRecord> {
        let area = finite(self.area)?;
        let rooms = finite(self.rooms)?;
        let price = finite(self.price)?;
        if area <= 0.0 || rooms < 0.0 {
            return None;
        }
        Some(HistoricalRecord {
            area,
            rooms: rooms.trunc() as u32,
            parking: finite(self.parking)? != 0.0,
            warehouse: finite(self.warehouse)? != 0.0,
            elevator: finite(self.elevator)? != 0.0,
            address: self.address.clone().filter(|a| !a.is_empty())?,
            price,
        })
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl From<HistoricalRecord> for RawRecord {
    fn from(record: HistoricalRecord) -> Self {
        let [parking, warehouse, elevator] = record.amenity_flags();
        Self {
            area: Some(record.area),
            rooms: Some(record.rooms as f64),
            parking: Some(parking),
            warehouse: Some(warehouse),
            elevator: Some(elevator),
            address: Some(record.address),
            price: Some(record.price),
        }
    }
}

pub fn load_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path).map_err(|e| {
        EstimatorError::Data(format!("failed to open dataset {}: {}", path.display(), e))
    })?;
    let records = read_records(file)?;
    info!(
        "Dataset {} loaded with {} records",
        path.display(),
        records.len()
    );
    Ok(records)
}

/// Parses CSV text with a header row. Unknown columns are ignored.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| EstimatorError::Data(format!("unable to read CSV header: {}", e)))?;
    let header_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_string(), idx))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !header_map.contains_key(*column))
        .collect();
    if !missing.is_empty() {
        return Err(EstimatorError::Data(format!(
            "dataset is missing required columns: {}",
            missing.join(", ")
        )));
    }
    let column = |name: &str| header_map[name];
    let columns = [
        column("Area"),
        column("Room"),
        column("Parking"),
        column("Warehouse"),
        column("Elevator"),
        column("Address"),
        column("Price"),
    ];

    let mut records = Vec::new();
    for (row_idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            EstimatorError::Data(format!("failed to parse CSV row {}: {}", row_idx + 2, e))
        })?;
        records.push(parse_row(&row, &columns));
    }
    debug!("Parsed {} CSV rows", records.len());
    Ok(records)
}

fn parse_row(row: &StringRecord, columns: &[usize; 7]) -> RawRecord {
    let cell = |idx: usize| row.get(idx).map(str::trim).filter(|s| !s.is_empty());
    RawRecord {
        area: cell(columns[0]).and_then(parse_number),
        rooms: cell(columns[1]).and_then(parse_number),
        parking: cell(columns[2]).and_then(parse_flag),
        warehouse: cell(columns[3]).and_then(parse_flag),
        elevator: cell(columns[4]).and_then(parse_flag),
        address: cell(columns[5]).map(str::to_string),
        price: cell(columns[6]).and_then(parse_number),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok()
}

fn parse_flag(text: &str) -> Option<f64> {
    match text.to_ascii_lowercase().as_str() {
        "true" => Some(1.0),
        "false" => Some(0.0),
        other => other.parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Area,Room,Parking,Warehouse,Elevator,Address,Price,Price(USD)
63,1,True,True,True,Shahran,1850000000,61666.67
60,1,1,0,1,Pardis,550000000,18333.33
,2,0,0,0,Punak,900000000,30000
79,2,False,True,maybe,Shahrake Gharb,5000000000,166666.67
";

    #[test]
    fn test_reads_rows_and_ignores_extra_columns() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].parking, Some(1.0));
        assert_eq!(records[1].warehouse, Some(0.0));
        assert_eq!(records[0].address.as_deref(), Some("Shahran"));
        assert_eq!(records[3].address.as_deref(), Some("Shahrake Gharb"));
    }

    #[test]
    fn test_missing_and_unparseable_cells_are_none() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records[2].area, None);
        assert_eq!(records[3].elevator, None);
        assert!(records[2].complete().is_none());
        assert!(records[3].complete().is_none());
        assert!(records[0].complete().is_some());
    }

    #[test]
    fn test_missing_columns_is_data_error() {
        let err = read_records("Area,Room,Address\n50,1,Punak\n".as_bytes()).unwrap_err();
        match err {
            EstimatorError::Data(msg) => {
                assert!(msg.contains("Parking"));
                assert!(msg.contains("Price"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_complete_rejects_non_positive_area_and_non_finite_price() {
        let mut raw = RawRecord::from(HistoricalRecord {
            area: 50.0,
            rooms: 1,
            parking: true,
            warehouse: false,
            elevator: false,
            address: "Punak".to_string(),
            price: 1.0e9,
        });
        assert!(raw.complete().is_some());
        raw.area = Some(-1.0);
        assert!(raw.complete().is_none());
        raw.area = Some(0.0);
        assert!(raw.complete().is_none());
        raw.area = Some(50.0);
        raw.price = Some(f64::INFINITY);
        assert!(raw.complete().is_none());
    }

    #[test]
    fn test_load_csv_missing_file() {
        let err = load_csv(Path::new("/nonexistent/house.csv")).unwrap_err();
        assert!(matches!(err, EstimatorError::Data(_)));
    }
}
