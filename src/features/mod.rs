// src/features/mod.rs
pub mod builder;
pub mod encoder;
pub mod scaler;

pub use builder::{build, FeatureVector, RawFields};
pub use encoder::AddressEncoder;
pub use scaler::StandardScaler;
