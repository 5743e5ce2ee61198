//! Zone investment scoring: feature normalization, regression scoring,
//! traffic-light classification, and narrative insights with rule-based
//! fallbacks at every external boundary.

pub mod config;
pub mod error;
pub mod prediction;
pub mod sources;
pub mod telemetry;
