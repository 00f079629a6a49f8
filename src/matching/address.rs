// src/matching/address.rs - Address autocomplete and validation against the known catalog
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{EstimatorError, Result};
use crate::utils::constants::{
    MAX_FALLBACK_SUGGESTIONS, MAX_SEARCH_RESULTS, MIN_VALID_CONFIDENCE, SCORE_EXACT,
    SCORE_PREFIX, SCORE_SUBSTRING, SCORE_WORD_PREFIX,
};

/// Known addresses in a fixed order. Matching is case-insensitive but always
/// returns the catalog's own spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressCatalog {
    entries: Vec<String>,
    lowered: Vec<String>,
}

impl AddressCatalog {
    /// Keeps the caller's order.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        let lowered = entries.iter().map(|e| e.to_lowercase()).collect();
        Self { entries, lowered }
    }

    /// Distinct entries in lexicographic order.
    pub fn from_vocabulary<'a, I>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = vocabulary.into_iter().collect();
        Self::new(distinct)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn iter_lowered(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter().zip(&self.lowered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub address: String,
    pub score: u8,
}

/// Outcome of resolving a user-typed address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Validation {
    Valid { matched: String, confidence: u8 },
    Invalid { suggestions: Vec<String> },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }
}

/// Score of one lowercased catalog entry against a lowercased, trimmed query.
/// The first matching tier wins; None excludes the entry.
fn score_entry(entry_lower: &str, query_lower: &str) -> Option<u8> {
    if entry_lower == query_lower {
        Some(SCORE_EXACT)
    } else if entry_lower.starts_with(query_lower) {
        Some(SCORE_PREFIX)
    } else if entry_lower.contains(query_lower) {
        Some(SCORE_SUBSTRING)
    } else if entry_lower
        .split_whitespace()
        .any(|word| word.starts_with(query_lower))
    {
        Some(SCORE_WORD_PREFIX)
    } else {
        None
    }
}

/// Autocomplete: up to ten matches, best first, ties in catalog order.
pub fn search(query: &str, catalog: &AddressCatalog) -> Vec<MatchCandidate> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    let mut matches: Vec<MatchCandidate> = catalog
        .iter_lowered()
        .filter_map(|(entry, lowered)| {
            score_entry(lowered, &query).map(|score| MatchCandidate {
                address: entry.clone(),
                score,
            })
        })
        .collect();
    // sort_by is stable
    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(MAX_SEARCH_RESULTS);
    debug!("Address search '{}' returned {} matches", query, matches.len());
    matches
}

/// Resolves `input` to one catalog entry, or suggests the first few entries.
pub fn validate(input: &str, catalog: &AddressCatalog) -> Result<Validation> {
    let input = input.trim();
    if input.is_empty() {
        return Err(EstimatorError::InvalidRequest(
            "address is required".to_string(),
        ));
    }
    let input_lower = input.to_lowercase();

    if let Some((entry, _)) = catalog
        .iter_lowered()
        .find(|(_, lowered)| **lowered == input_lower)
    {
        return Ok(Validation::Valid {
            matched: entry.clone(),
            confidence: SCORE_EXACT,
        });
    }

    // Running best; a later entry must score strictly higher to replace it.
    let mut best: Option<(&String, u8)> = None;
    for (entry, lowered) in catalog.iter_lowered() {
        if let Some(score) = score_entry(lowered, &input_lower) {
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((entry, score));
            }
        }
    }

    match best {
        Some((entry, score)) if score >= MIN_VALID_CONFIDENCE => Ok(Validation::Valid {
            matched: entry.clone(),
            confidence: score,
        }),
        _ => {
            debug!("No catalog match for '{}', returning suggestions", input);
            Ok(Validation::Invalid {
                suggestions: catalog
                    .entries()
                    .iter()
                    .take(MAX_FALLBACK_SUGGESTIONS)
                    .cloned()
                    .collect(),
            })
        }
    }
}

/// Closest spellings by Jaro-Winkler similarity, most similar first.
pub fn nearest(query: &str, catalog: &AddressCatalog, k: usize) -> Vec<(String, f64)> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<(String, f64)> = catalog
        .iter_lowered()
        .map(|(entry, lowered)| (entry.clone(), strsim::jaro_winkler(&query, lowered)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}
