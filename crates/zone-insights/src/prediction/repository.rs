use super::domain::PredictionRecord;

/// Storage abstraction for prediction history so the service can be
/// exercised without a database.
pub trait PredictionRepository: Send + Sync {
    fn append(&self, records: &[PredictionRecord]) -> Result<(), RepositoryError>;
    fn all(&self) -> Result<Vec<PredictionRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
