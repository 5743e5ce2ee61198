use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use zone_insights::error::AppError;
use zone_insights::prediction::{
    prediction_router, CancelSignal, PredictionRecord, PredictionRepository, PredictionService,
};
use zone_insights::sources::{CsvZoneSource, ZoneSource};

pub(crate) fn with_prediction_routes<R>(service: Arc<PredictionService<R>>) -> Router
where
    R: PredictionRepository + 'static,
{
    prediction_router(service.clone())
        .route(
            "/predict/csv",
            post(csv_predict_endpoint::<R>).with_state(service),
        )
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Scores a CSV upload. Rows with a missing or unparsable postcode come back
/// degraded like they do on `/predict`; only a table that cannot be parsed
/// at all is rejected.
pub(crate) async fn csv_predict_endpoint<R>(
    State(service): State<Arc<PredictionService<R>>>,
    body: String,
) -> Result<Json<Vec<PredictionRecord>>, AppError>
where
    R: PredictionRepository + 'static,
{
    let source = CsvZoneSource::from_text("upload", body);
    let rows = source.fetch()?;
    source.validate(&rows)?;

    info!(rows = rows.len(), "scoring CSV upload");
    let records = service.predict_records(&rows, &CancelSignal::never()).await;
    Ok(Json(records))
}
