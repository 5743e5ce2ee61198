use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::anthropic::AnthropicBackend;
use super::openai::OpenAiBackend;
use crate::config::InsightConfig;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("provider error: {message}")]
    Provider { message: String },
    #[error("backend did not answer within {after:?}")]
    Timeout { after: Duration },
    #[error("request cancelled")]
    Cancelled,
    #[error("malformed completion: {0}")]
    MalformedResponse(String),
    #[error("configuration error: {message}")]
    Config { message: String },
}

/// External text-generation service. Implementations must be safe to call
/// from many requests at once.
#[async_trait::async_trait]
pub trait InsightBackend: Send + Sync {
    /// Reported as `generated_by` on successful insights.
    fn name(&self) -> &str;

    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, BackendError>;
}

/// Picks a backend from configuration. `Ok(None)` means no credentials were
/// supplied and insights stay rule-based.
pub fn backend_from_config(
    config: &InsightConfig,
) -> Result<Option<Arc<dyn InsightBackend>>, BackendError> {
    let provider = match config.provider.as_deref() {
        Some(explicit) => explicit.trim().to_ascii_lowercase(),
        None => match detect_provider(config) {
            Some(detected) => detected.to_string(),
            None => return Ok(None),
        },
    };

    match provider.as_str() {
        "openai" | "gpt" => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| BackendError::Config {
                message: "OPENAI_API_KEY is not set".to_string(),
            })?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            let backend =
                OpenAiBackend::new(api_key, model, config.base_url.clone(), config.timeout)?;
            Ok(Some(Arc::new(backend)))
        }
        "anthropic" | "claude" => {
            let api_key = config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| BackendError::Config {
                    message: "ANTHROPIC_API_KEY is not set".to_string(),
                })?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
            let backend =
                AnthropicBackend::new(api_key, model, config.base_url.clone(), config.timeout)?;
            Ok(Some(Arc::new(backend)))
        }
        "none" | "rule-based" | "rules" => Ok(None),
        other => Err(BackendError::Config {
            message: format!("unknown insight provider '{other}' (use 'openai' or 'anthropic')"),
        }),
    }
}

fn detect_provider(config: &InsightConfig) -> Option<&'static str> {
    if config.openai_api_key.is_some() {
        info!("insight backend auto-detected: OpenAI (OPENAI_API_KEY found)");
        return Some("openai");
    }
    if config.anthropic_api_key.is_some() {
        info!("insight backend auto-detected: Anthropic (ANTHROPIC_API_KEY found)");
        return Some("anthropic");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_credentials_means_no_backend() {
        let backend = backend_from_config(&InsightConfig::disabled()).expect("no error");
        assert!(backend.is_none());
    }

    #[test]
    fn openai_key_selects_openai_with_default_model() {
        let mut config = InsightConfig::disabled();
        config.openai_api_key = Some("sk-test".to_string());
        let backend = backend_from_config(&config)
            .expect("builds")
            .expect("backend configured");
        assert_eq!(backend.name(), "gpt-4");
    }

    #[test]
    fn explicit_provider_requires_its_key() {
        let mut config = InsightConfig::disabled();
        config.provider = Some("anthropic".to_string());
        config.openai_api_key = Some("sk-test".to_string());
        let error = backend_from_config(&config)
            .err()
            .expect("missing anthropic key");
        assert!(matches!(error, BackendError::Config { .. }));
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let mut config = InsightConfig::disabled();
        config.provider = Some("carrier-pigeon".to_string());
        assert!(matches!(
            backend_from_config(&config),
            Err(BackendError::Config { .. })
        ));
    }
}
