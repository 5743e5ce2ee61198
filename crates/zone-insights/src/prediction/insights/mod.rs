//! Narrative insight generation.
//!
//! A configured backend is asked first. Any backend failure, timeout or
//! cancellation falls through to the deterministic rule-based narrative, so
//! every scored zone receives an insight.

mod anthropic;
mod backend;
mod openai;
mod prompt;
mod rules;

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::InsightConfig;
use crate::prediction::domain::{FeatureVector, Insight, InsightSource};

pub use anthropic::AnthropicBackend;
pub use backend::{backend_from_config, BackendError, InsightBackend};
pub use openai::OpenAiBackend;
pub use rules::InsightComputationError;

/// Produces one [`Insight`] per scored zone.
pub struct InsightGenerator {
    backend: Option<Arc<dyn InsightBackend>>,
    timeout: Duration,
}

impl InsightGenerator {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

    /// No backend; every insight is rule-based.
    pub fn rule_based() -> Self {
        Self {
            backend: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_backend(backend: Arc<dyn InsightBackend>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    /// Builds the generator from configuration. A misconfigured provider is
    /// logged and degrades to rule-based generation.
    pub fn from_config(config: &InsightConfig) -> Self {
        match backend_from_config(config) {
            Ok(Some(backend)) => {
                info!(backend = backend.name(), timeout = ?config.timeout, "insight backend configured");
                Self::with_backend(backend, config.timeout)
            }
            Ok(None) => {
                info!("no insight backend configured; using rule-based insights");
                Self {
                    backend: None,
                    timeout: config.timeout,
                }
            }
            Err(error) => {
                warn!(%error, "insight backend unavailable; using rule-based insights");
                Self {
                    backend: None,
                    timeout: config.timeout,
                }
            }
        }
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_deref().map(|backend| backend.name())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn generate(&self, vector: &FeatureVector, score: f64) -> Insight {
        self.generate_with_cancel(vector, score, &CancelSignal::never())
            .await
    }

    /// Like [`generate`](Self::generate), but abandons the backend call once
    /// `cancel` fires. Calls made after cancellation skip the backend.
    pub async fn generate_with_cancel(
        &self,
        vector: &FeatureVector,
        score: f64,
        cancel: &CancelSignal,
    ) -> Insight {
        if let Some(backend) = self.backend.as_deref() {
            if cancel.is_cancelled() {
                debug!(postcode = vector.postcode(), "request cancelled; skipping backend");
            } else {
                match self.ask_backend(backend, vector, score, cancel).await {
                    Ok(insight) => return insight,
                    Err(error) => warn!(
                        postcode = vector.postcode(),
                        backend = backend.name(),
                        %error,
                        "backend insight failed; falling back to rules"
                    ),
                }
            }
        }

        Self::fallback(vector)
    }

    async fn ask_backend(
        &self,
        backend: &dyn InsightBackend,
        vector: &FeatureVector,
        score: f64,
        cancel: &CancelSignal,
    ) -> Result<Insight, BackendError> {
        let prompt = prompt::build_prompt(vector, score);
        let request = tokio::time::timeout(
            self.timeout,
            backend.complete(prompt::SYSTEM_PROMPT, &prompt),
        );

        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            outcome = request => outcome
                .map_err(|_| BackendError::Timeout { after: self.timeout })??,
        };

        let (summary, full_analysis) = prompt::parse_completion(&text)?;
        Ok(Insight {
            summary,
            full_analysis,
            confidence: Insight::BACKEND_CONFIDENCE,
            generated_by: InsightSource::Backend(backend.name().to_string()),
        })
    }

    fn fallback(vector: &FeatureVector) -> Insight {
        match rules::rule_based_insight(vector) {
            Ok(insight) => insight,
            Err(error) => {
                warn!(postcode = vector.postcode(), %error, "rule-based insight failed");
                Insight::error_handler()
            }
        }
    }
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self::rule_based()
    }
}

impl std::fmt::Debug for InsightGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightGenerator")
            .field("backend", &self.backend_name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Observes request cancellation. Cloning is cheap; all clones observe the
/// same [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver
            .as_ref()
            .map(|receiver| *receiver.borrow())
            .unwrap_or(false)
    }

    /// Resolves once cancelled. Stays pending forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(receiver) = self.receiver.as_ref() else {
            return future::pending().await;
        };

        let mut receiver = receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                return future::pending().await;
            }
        }
    }
}

/// Owner side of a [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle { sender },
        CancelSignal {
            receiver: Some(receiver),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::domain::{FeatureKind, FEATURE_COUNT};

    fn defaults(postcode: &str) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        for kind in FeatureKind::ALL {
            values[kind.index()] = kind.default_value();
        }
        FeatureVector::from_parts(postcode, values)
    }

    #[tokio::test]
    async fn rule_based_generator_never_consults_a_backend() {
        let generator = InsightGenerator::rule_based();
        assert!(generator.backend_name().is_none());

        let insight = generator.generate(&defaults("2000"), 70.0).await;
        assert_eq!(insight.generated_by, InsightSource::RuleBased);
        assert_eq!(insight.confidence, Insight::RULE_BASED_CONFIDENCE);
        assert!(insight.summary.starts_with("Zone 2000 shows"));
    }

    #[tokio::test]
    async fn cancel_signal_resolves_after_cancel() {
        let (handle, signal) = cancel_pair();
        assert!(!signal.is_cancelled());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation observed")
            .expect("task joined");
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn never_signal_stays_pending() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn dropped_handle_does_not_cancel() {
        let (handle, signal) = cancel_pair();
        drop(handle);
        assert!(!signal.is_cancelled());
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }
}
