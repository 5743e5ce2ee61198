use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryPredictionRepository};
use crate::routes::with_prediction_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use zone_insights::config::AppConfig;
use zone_insights::error::AppError;
use zone_insights::prediction::PredictionService;
use zone_insights::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(model) = args.model.take() {
        config.model.path = Some(model);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryPredictionRepository::from_config(&config.history));
    let prediction_service = Arc::new(PredictionService::from_config(&config, repository));
    let health = prediction_service.health();

    let app = with_prediction_routes(prediction_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        model_loaded = health.model_loaded,
        insight_backend = health.insight_backend.as_deref().unwrap_or("rule-based"),
        "zone insights service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
