// src/features/builder.rs
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::features::encoder::AddressEncoder;
use crate::utils::constants::FEATURE_COUNT;

/// One property's attributes in the fixed model column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub area: f64,
    pub rooms: f64,
    pub parking: f64,
    pub warehouse: f64,
    pub elevator: f64,
    pub address_encoded: f64,
    pub total_amenities: f64,
}

impl FeatureVector {
    pub fn new(
        area: f64,
        rooms: f64,
        parking: f64,
        warehouse: f64,
        elevator: f64,
        address_code: usize,
    ) -> Self {
        Self {
            area,
            rooms,
            parking,
            warehouse,
            elevator,
            address_encoded: address_code as f64,
            total_amenities: parking + warehouse + elevator,
        }
    }

    /// Values in `FEATURE_NAMES` order.
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.area,
            self.rooms,
            self.parking,
            self.warehouse,
            self.elevator,
            self.address_encoded,
            self.total_amenities,
        ]
    }
}

/// Request fields as they arrive from an end user, before any coercion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFields {
    #[serde(default)]
    pub area: JsonValue,
    #[serde(default)]
    pub rooms: JsonValue,
    #[serde(default)]
    pub parking: JsonValue,
    #[serde(default)]
    pub warehouse: JsonValue,
    #[serde(default)]
    pub elevator: JsonValue,
    #[serde(default)]
    pub address: JsonValue,
}

impl RawFields {
    pub fn new(
        area: f64,
        rooms: u32,
        parking: bool,
        warehouse: bool,
        elevator: bool,
        address: &str,
    ) -> Self {
        Self {
            area: json!(area),
            rooms: json!(rooms),
            parking: json!(parking),
            warehouse: json!(warehouse),
            elevator: json!(elevator),
            address: json!(address),
        }
    }

    /// The address as a string; numbers are stringified, anything else is empty.
    pub fn address_text(&self) -> String {
        match &self.address {
            JsonValue::String(s) => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn with_address(&self, address: &str) -> Self {
        Self {
            address: json!(address),
            ..self.clone()
        }
    }
}

/// Lenient numeric coercion: anything that is not a number defaults to 0.
pub fn coerce_number(value: &JsonValue) -> f64 {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

fn coerce_integer(value: &JsonValue) -> f64 {
    coerce_number(value).trunc()
}

/// Builds the feature vector for one request. Never fails.
pub fn build(fields: &RawFields, encoder: &AddressEncoder) -> FeatureVector {
    let address = fields.address_text();
    let code = match encoder.encode(&address) {
        Some(code) => code,
        None => {
            debug!(
                "Address '{}' is outside the fitted vocabulary, using sentinel code",
                address
            );
            encoder.encode_or_sentinel(&address)
        }
    };
    FeatureVector::new(
        coerce_number(&fields.area),
        coerce_integer(&fields.rooms),
        coerce_integer(&fields.parking),
        coerce_integer(&fields.warehouse),
        coerce_integer(&fields.elevator),
        code,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::UNSEEN_ADDRESS_CODE;

    fn encoder() -> AddressEncoder {
        AddressEncoder::fit(["Punak", "Shahran", "Tajrish"])
    }

    #[test]
    fn test_total_amenities_is_sum_of_flags() {
        for parking in [false, true] {
            for warehouse in [false, true] {
                for elevator in [false, true] {
                    let fields = RawFields::new(80.0, 2, parking, warehouse, elevator, "Punak");
                    let v = build(&fields, &encoder());
                    assert_eq!(v.total_amenities, v.parking + v.warehouse + v.elevator);
                }
            }
        }
    }

    #[test]
    fn test_known_address_is_encoded() {
        let v = build(&RawFields::new(120.0, 3, true, false, true, "Tajrish"), &encoder());
        assert_eq!(v.as_array(), [120.0, 3.0, 1.0, 0.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_unseen_address_uses_sentinel() {
        let v = build(&RawFields::new(60.0, 1, false, false, false, "Narmak"), &encoder());
        assert_eq!(v.address_encoded, UNSEEN_ADDRESS_CODE as f64);
    }

    #[test]
    fn test_malformed_fields_default_to_zero() {
        let fields: RawFields = serde_json::from_value(json!({
            "area": "not a number",
            "rooms": [1, 2],
            "parking": null,
            "warehouse": "1",
            "address": 42
        }))
        .unwrap();
        let v = build(&fields, &encoder());
        assert_eq!(v.area, 0.0);
        assert_eq!(v.rooms, 0.0);
        assert_eq!(v.parking, 0.0);
        assert_eq!(v.warehouse, 1.0);
        assert_eq!(v.elevator, 0.0);
        assert_eq!(v.total_amenities, 1.0);
        assert_eq!(fields.address_text(), "42");
    }

    #[test]
    fn test_string_numbers_are_trimmed_and_truncated() {
        let fields: RawFields = serde_json::from_value(json!({
            "area": " 75.5 ",
            "rooms": "2.9",
        }))
        .unwrap();
        let v = build(&fields, &encoder());
        assert_eq!(v.area, 75.5);
        assert_eq!(v.rooms, 2.0);
    }
}
