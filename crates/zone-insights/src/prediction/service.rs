use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::domain::{PredictionOutcome, PredictionRecord, RawZoneRecord, RecordKind, ScoreResult};
use super::insights::{CancelSignal, InsightGenerator};
use super::model::ScorePredictor;
use super::normalizer::{self, NormalizedRow};
use super::repository::PredictionRepository;
use super::summary::ZoneSummary;
use crate::config::AppConfig;

/// Orchestrates normalization, scoring, classification and insights for a
/// batch of zones. Shared across request handlers behind an `Arc`.
pub struct PredictionService<R> {
    predictor: Arc<ScorePredictor>,
    insights: Arc<InsightGenerator>,
    repository: Arc<R>,
}

impl<R> PredictionService<R>
where
    R: PredictionRepository + 'static,
{
    pub fn new(
        predictor: Arc<ScorePredictor>,
        insights: Arc<InsightGenerator>,
        repository: Arc<R>,
    ) -> Self {
        Self {
            predictor,
            insights,
            repository,
        }
    }

    pub fn from_config(config: &AppConfig, repository: Arc<R>) -> Self {
        let predictor = Arc::new(ScorePredictor::from_config(&config.model));
        let insights = Arc::new(InsightGenerator::from_config(&config.insights));
        Self::new(predictor, insights, repository)
    }

    pub fn predictor(&self) -> &ScorePredictor {
        &self.predictor
    }

    pub fn insights(&self) -> &InsightGenerator {
        &self.insights
    }

    /// Scores a request body. Never fails: an unusable body yields the
    /// sentinel record and bad rows yield degraded records.
    pub async fn predict(&self, input: &Value) -> PredictionOutcome {
        self.predict_with_cancel(input, &CancelSignal::never())
            .await
    }

    pub async fn predict_with_cancel(
        &self,
        input: &Value,
        cancel: &CancelSignal,
    ) -> PredictionOutcome {
        let rows = match normalizer::rows_from_value(input) {
            Ok(rows) => rows,
            Err(error) => {
                warn!(%error, "prediction input rejected; returning sentinel record");
                return PredictionOutcome::Single(PredictionRecord::sentinel(Utc::now()));
            }
        };

        let mut records = self.predict_records(&rows, cancel).await;
        if records.len() == 1 {
            if let Some(record) = records.pop() {
                return PredictionOutcome::Single(record);
            }
        }
        PredictionOutcome::Batch(records)
    }

    /// Scores already-split rows, one record per row in input order, and
    /// appends them to the prediction history.
    pub async fn predict_records(
        &self,
        rows: &[RawZoneRecord],
        cancel: &CancelSignal,
    ) -> Vec<PredictionRecord> {
        let normalized = normalizer::normalize(rows);
        let mut records = Vec::with_capacity(normalized.len());

        for (index, row) in normalized.into_iter().enumerate() {
            records.push(self.predict_row(index, row, cancel).await);
        }

        if !records.is_empty() {
            if let Err(error) = self.repository.append(&records) {
                warn!(%error, count = records.len(), "failed to record prediction history");
            }
        }

        info!(
            rows = records.len(),
            degraded = records
                .iter()
                .filter(|record| record.kind == RecordKind::Degraded)
                .count(),
            "zone batch scored"
        );
        records
    }

    async fn predict_row(
        &self,
        index: usize,
        row: NormalizedRow,
        cancel: &CancelSignal,
    ) -> PredictionRecord {
        let vector = match row.features {
            Ok(vector) => vector,
            Err(error) => {
                warn!(row = index, %error, "zone row could not be normalized; degrading");
                return PredictionRecord::degraded(row.postcode, Utc::now());
            }
        };

        let score = self.predictor.score(&vector);
        let result = ScoreResult::from_score(Some(score));
        let insight = self
            .insights
            .generate_with_cancel(&vector, score, cancel)
            .await;

        debug!(
            row = index,
            postcode = vector.postcode(),
            score,
            category = result.category.label(),
            generated_by = insight.generated_by.label(),
            "zone scored"
        );
        PredictionRecord::scored(&vector, result, insight, Utc::now())
    }

    /// History summary; an unreadable repository reports the zeroed summary.
    pub fn summary(&self) -> ZoneSummary {
        let now = Utc::now();
        match self.repository.all() {
            Ok(records) => ZoneSummary::from_records(&records, now),
            Err(error) => {
                warn!(%error, "prediction history unavailable; reporting empty summary");
                ZoneSummary::empty(now)
            }
        }
    }

    pub fn health(&self) -> ServiceHealth {
        ServiceHealth {
            status: "healthy",
            model_loaded: self.predictor.is_loaded(),
            model_kind: self.predictor.model_kind(),
            insight_backend: self.insights.backend_name().map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// Liveness payload for the `/health` route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_kind: Option<&'static str>,
    pub insight_backend: Option<String>,
    pub timestamp: DateTime<Utc>,
}
