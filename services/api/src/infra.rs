use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use zone_insights::config::HistoryConfig;
use zone_insights::prediction::{PredictionRecord, PredictionRepository, RepositoryError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local prediction history backing `/summary`. Holds at most
/// `max_records` entries; the oldest are evicted first.
#[derive(Clone)]
pub(crate) struct InMemoryPredictionRepository {
    records: Arc<Mutex<VecDeque<PredictionRecord>>>,
    max_records: usize,
}

impl InMemoryPredictionRepository {
    pub(crate) fn with_limit(max_records: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::new())),
            max_records: max_records.max(1),
        }
    }

    pub(crate) fn from_config(config: &HistoryConfig) -> Self {
        Self::with_limit(config.max_records)
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<PredictionRecord>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("prediction history lock poisoned".to_string()))
    }
}

impl Default for InMemoryPredictionRepository {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

impl PredictionRepository for InMemoryPredictionRepository {
    fn append(&self, records: &[PredictionRecord]) -> Result<(), RepositoryError> {
        let mut history = self.lock()?;
        let incoming = records.len().min(self.max_records);
        let overflow = (history.len() + incoming).saturating_sub(self.max_records);
        history.drain(..overflow);
        history.extend(records[records.len() - incoming..].iter().cloned());
        Ok(())
    }

    fn all(&self) -> Result<Vec<PredictionRecord>, RepositoryError> {
        Ok(self.lock()?.iter().cloned().collect())
    }
}
