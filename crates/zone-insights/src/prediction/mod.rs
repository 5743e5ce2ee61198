//! Zone scoring pipeline.
//!
//! Raw rows flow through the normalizer, the score predictor and the
//! classifier, then pick up a narrative insight. The service assembles one
//! record per row and never surfaces an internal failure to the caller.

pub mod classifier;
pub mod domain;
pub mod insights;
pub mod model;
pub mod normalizer;
pub mod repository;
pub mod router;
pub mod service;
pub mod summary;

#[cfg(test)]
mod tests;

pub use classifier::{classify, GREEN_THRESHOLD, YELLOW_THRESHOLD};
pub use domain::{
    FeatureKind, FeatureVector, Insight, InsightSource, PredictionOutcome, PredictionRecord,
    RawZoneRecord, RecordKind, ScoreResult, ZoneCategory, ZoneMetrics, FEATURE_COUNT,
};
pub use insights::{
    backend_from_config, cancel_pair, BackendError, CancelHandle, CancelSignal, InsightBackend,
    InsightGenerator,
};
pub use model::{
    LinearModel, ModelArtifact, ModelError, RegressionModel, ScorePredictor, TreeEnsemble,
};
pub use normalizer::{normalize, normalize_record, InputShapeError, RowNormalizationError};
pub use repository::{PredictionRepository, RepositoryError};
pub use router::prediction_router;
pub use service::{PredictionService, ServiceHealth};
pub use summary::ZoneSummary;
