// src/matching/mod.rs
pub mod address;

pub use address::{nearest, search, validate, AddressCatalog, MatchCandidate, Validation};
