// src/features/encoder.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::utils::constants::UNSEEN_ADDRESS_CODE;

/// Address → integer code mapping learned once per training run.
///
/// Codes are ranks in byte-wise sorted order of the distinct addresses, so the
/// same vocabulary always yields the same codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEncoder {
    classes: Vec<String>,
}

impl AddressEncoder {
    pub fn fit<'a, I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = addresses.into_iter().collect();
        Self {
            classes: distinct.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn encode(&self, address: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(address))
            .ok()
    }

    /// Encodes `address`, mapping anything outside the vocabulary to the sentinel code.
    pub fn encode_or_sentinel(&self, address: &str) -> usize {
        self.encode(address).unwrap_or(UNSEEN_ADDRESS_CODE)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.encode(address).is_some()
    }

    /// The vocabulary in code order, which is also lexicographic order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub(crate) fn is_sorted_unique(&self) -> bool {
        self.classes.windows(2).all(|w| w[0] < w[1])
    }
}
