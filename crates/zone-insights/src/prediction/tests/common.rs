use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::{json, Value};

use crate::prediction::domain::{FeatureKind, FeatureVector, PredictionRecord, FEATURE_COUNT};
use crate::prediction::insights::{BackendError, InsightBackend, InsightGenerator};
use crate::prediction::model::{LinearModel, ModelError, RegressionModel, ScorePredictor};
use crate::prediction::repository::{PredictionRepository, RepositoryError};
use crate::prediction::PredictionService;

pub(super) fn well_formed_row(postcode: &str) -> Value {
    json!({
        "postcode": postcode,
        "growth_rate": 0.05,
        "crime_rate": 0.02,
        "infrastructure_score": 0.8,
        "sentiment": 0.6,
        "interest_rate": 0.045,
        "wages": 85000,
        "housing_supply_encoded": 1,
        "immigration_encoded": 2
    })
}

pub(super) fn default_vector(postcode: &str) -> FeatureVector {
    let mut values = [0.0; FEATURE_COUNT];
    for kind in FeatureKind::ALL {
        values[kind.index()] = kind.default_value();
    }
    FeatureVector::from_parts(postcode, values)
}

/// `score = 40 + 500 * growth_rate`, so a growth of 0.05 lands on 65 and
/// 0.08 lands on 80.
pub(super) fn growth_model() -> Arc<ScorePredictor> {
    let mut coefficients = vec![0.0; FEATURE_COUNT];
    coefficients[FeatureKind::GrowthRate.index()] = 500.0;
    Arc::new(ScorePredictor::with_model(Arc::new(LinearModel {
        intercept: 40.0,
        coefficients,
    })))
}

pub(super) fn build_service(
    predictor: Arc<ScorePredictor>,
    insights: InsightGenerator,
) -> (PredictionService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = PredictionService::new(predictor, Arc::new(insights), repository.clone());
    (service, repository)
}

pub(super) fn rule_based_service() -> (PredictionService<MemoryRepository>, Arc<MemoryRepository>)
{
    build_service(growth_model(), InsightGenerator::rule_based())
}

pub(super) async fn json_body(response: Response) -> Value {
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<Vec<PredictionRecord>>>,
}

impl MemoryRepository {
    pub(super) fn stored(&self) -> Vec<PredictionRecord> {
        self.records.lock().expect("repository mutex poisoned").clone()
    }
}

impl PredictionRepository for MemoryRepository {
    fn append(&self, records: &[PredictionRecord]) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .extend_from_slice(records);
        Ok(())
    }

    fn all(&self) -> Result<Vec<PredictionRecord>, RepositoryError> {
        Ok(self.stored())
    }
}

pub(super) struct UnavailableRepository;

impl PredictionRepository for UnavailableRepository {
    fn append(&self, _records: &[PredictionRecord]) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn all(&self) -> Result<Vec<PredictionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }
}

#[derive(Debug)]
pub(super) struct FailingModel;

impl RegressionModel for FailingModel {
    fn kind(&self) -> &'static str {
        "failing"
    }

    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
        Err(ModelError::Inference("matrix is singular".to_string()))
    }
}

/// Answers every prompt with a fixed completion and counts the calls.
pub(super) struct StubBackend {
    reply: String,
    calls: AtomicUsize,
}

impl StubBackend {
    pub(super) fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InsightBackend for StubBackend {
    fn name(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, _system_prompt: &str, _prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

pub(super) struct FailingBackend;

#[async_trait::async_trait]
impl InsightBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing-model"
    }

    async fn complete(&self, _system_prompt: &str, _prompt: &str) -> Result<String, BackendError> {
        Err(BackendError::Provider {
            message: "rate limited".to_string(),
        })
    }
}

/// Never answers within any reasonable test budget.
pub(super) struct SlowBackend {
    calls: AtomicUsize,
}

impl SlowBackend {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InsightBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow-model"
    }

    async fn complete(&self, _system_prompt: &str, _prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("too late\nstill too late".to_string())
    }
}
