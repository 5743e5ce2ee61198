use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use zone_insights::config::{AppConfig, InsightConfig};
use zone_insights::error::AppError;
use zone_insights::prediction::{
    cancel_pair, CancelSignal, InsightGenerator, PredictionRecord, PredictionService,
    ScorePredictor,
};
use zone_insights::sources::{CsvZoneSource, SourceRegistry};
use zone_insights::telemetry;

use crate::infra::InMemoryPredictionRepository;

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// JSON file holding one zone object or a list of zone objects
    #[arg(long)]
    pub(crate) input: Option<PathBuf>,
    /// CSV exports with a header row; may be repeated
    #[arg(long = "csv")]
    pub(crate) csv: Vec<PathBuf>,
    /// Override the configured model artifact path
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
    /// Skip the text-generation backend and use rule-based insights only
    #[arg(long)]
    pub(crate) rules_only: bool,
    /// Print the records as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        input,
        csv,
        model,
        rules_only,
        json,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(model) = model {
        config.model.path = Some(model);
    }
    if rules_only {
        config.insights = InsightConfig {
            timeout: config.insights.timeout,
            ..InsightConfig::disabled()
        };
    }
    telemetry::init(&config.telemetry)?;

    let service = PredictionService::new(
        Arc::new(ScorePredictor::from_config(&config.model)),
        Arc::new(InsightGenerator::from_config(&config.insights)),
        Arc::new(InMemoryPredictionRepository::from_config(&config.history)),
    );

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing with rule-based insights");
            handle.cancel();
        }
    });

    let records = score_inputs(&service, input.as_deref(), &csv, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        render_table(&records);
        let summary = service.summary();
        println!(
            "\n{} zones scored, average score {:.1} (green {}, yellow {}, red {})",
            summary.total_zones,
            summary.average_score,
            summary.zone_distribution.get("green").copied().unwrap_or(0),
            summary.zone_distribution.get("yellow").copied().unwrap_or(0),
            summary.zone_distribution.get("red").copied().unwrap_or(0),
        );
    }

    Ok(())
}

async fn score_inputs(
    service: &PredictionService<InMemoryPredictionRepository>,
    input: Option<&Path>,
    csv: &[PathBuf],
    cancel: &CancelSignal,
) -> Result<Vec<PredictionRecord>, AppError> {
    let mut records = Vec::new();

    if let Some(path) = input {
        let text = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        let outcome = service.predict_with_cancel(&value, cancel).await;
        records.extend(outcome.into_records());
    }

    if !csv.is_empty() {
        let mut registry = SourceRegistry::new();
        for path in csv {
            registry.register(Box::new(CsvZoneSource::from_path(
                path.display().to_string(),
                path.clone(),
            )))?;
        }
        let rows = registry.collect();
        records.extend(service.predict_records(&rows, cancel).await);
    }

    Ok(records)
}

fn render_table(records: &[PredictionRecord]) {
    println!(
        "{:<10} {:>7}  {:<7} {:<14} Summary",
        "Postcode", "Score", "Color", "Insight"
    );
    for record in records {
        let score = record
            .result
            .score
            .map(|score| format!("{score:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let (source, summary) = match &record.insight {
            Some(insight) => (insight.generated_by.label(), insight.summary.as_str()),
            None => ("-", ""),
        };
        println!(
            "{:<10} {:>7}  {:<7} {:<14} {}",
            record.postcode,
            score,
            record.result.category.label(),
            source,
            summary
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use zone_insights::prediction::RecordKind;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("zone-insights-score-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    fn service() -> PredictionService<InMemoryPredictionRepository> {
        PredictionService::new(
            Arc::new(ScorePredictor::unavailable()),
            Arc::new(InsightGenerator::rule_based()),
            Arc::new(InMemoryPredictionRepository::default()),
        )
    }

    #[tokio::test]
    async fn scores_json_and_csv_inputs_in_order() {
        let json = temp_file("zones.json", r#"[{"postcode": "2000"}, {"postcode": "abc"}]"#);
        let csv = temp_file("zones.csv", "postcode,wages\n3000,90000\n");

        let records = score_inputs(
            &service(),
            Some(json.as_path()),
            &[csv],
            &CancelSignal::never(),
        )
        .await
        .expect("inputs scored");

        let postcodes: Vec<_> = records.iter().map(|record| record.postcode.as_str()).collect();
        assert_eq!(postcodes, vec!["2000", "0000", "3000"]);
    }

    #[tokio::test]
    async fn csv_rows_without_postcode_are_degraded_not_dropped() {
        let csv = temp_file("blank-postcode.csv", "postcode,wages\n2000,90000\n,85000\n3000,80000\n");

        let records = score_inputs(&service(), None, &[csv], &CancelSignal::never())
            .await
            .expect("inputs scored");

        let postcodes: Vec<_> = records.iter().map(|record| record.postcode.as_str()).collect();
        assert_eq!(postcodes, vec!["2000", "0000", "3000"]);
        assert_eq!(records[1].kind, RecordKind::Degraded);
    }

    #[tokio::test]
    async fn unreadable_csv_is_skipped() {
        let missing = PathBuf::from("/nonexistent/zones.csv");

        let records = score_inputs(&service(), None, &[missing], &CancelSignal::never())
            .await
            .expect("registry skips failing sources");

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn invalid_json_file_is_an_input_error() {
        let json = temp_file("broken.json", "{not json");

        let error = score_inputs(
            &service(),
            Some(json.as_path()),
            &[],
            &CancelSignal::never(),
        )
        .await
        .expect_err("malformed json");

        assert!(matches!(error, AppError::Input(_)));
    }
}
