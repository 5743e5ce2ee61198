use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;

use super::repository::PredictionRepository;
use super::service::PredictionService;

/// Router builder exposing scoring, summary and health endpoints.
pub fn prediction_router<R>(service: Arc<PredictionService<R>>) -> Router
where
    R: PredictionRepository + 'static,
{
    Router::new()
        .route("/predict", post(predict_handler::<R>))
        .route("/summary", get(summary_handler::<R>))
        .route("/health", get(health_handler::<R>))
        .with_state(service)
}

pub(crate) async fn predict_handler<R>(
    State(service): State<Arc<PredictionService<R>>>,
    axum::Json(payload): axum::Json<Value>,
) -> Response
where
    R: PredictionRepository + 'static,
{
    let outcome = service.predict(&payload).await;
    (StatusCode::OK, axum::Json(outcome)).into_response()
}

pub(crate) async fn summary_handler<R>(
    State(service): State<Arc<PredictionService<R>>>,
) -> Response
where
    R: PredictionRepository + 'static,
{
    (StatusCode::OK, axum::Json(service.summary())).into_response()
}

pub(crate) async fn health_handler<R>(
    State(service): State<Arc<PredictionService<R>>>,
) -> Response
where
    R: PredictionRepository + 'static,
{
    (StatusCode::OK, axum::Json(service.health())).into_response()
}
