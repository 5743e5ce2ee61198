//! Fitted regression artifacts and the scoring wrapper around them.
//!
//! Training happens elsewhere; this module only loads a serialized artifact
//! and evaluates it. Whenever no usable model is present, or evaluation
//! fails, the predictor answers with the neutral score.

mod ensemble;
mod linear;

pub use ensemble::{RegressionTree, TreeEnsemble, TreeNode};
pub use linear::LinearModel;

use std::fmt::Debug;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;

use super::domain::{FeatureVector, PredictionRecord, FEATURE_COUNT};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("model inference failed: {0}")]
    Inference(String),
}

/// Shared, read-only regression over the eight ordered features.
pub trait RegressionModel: Debug + Send + Sync {
    fn kind(&self) -> &'static str;
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError>;
}

/// Serialized model, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

impl ModelArtifact {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ModelError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn into_model(self) -> Result<Arc<dyn RegressionModel>, ModelError> {
        match self {
            ModelArtifact::Linear(model) => {
                model.validate()?;
                Ok(Arc::new(model))
            }
            ModelArtifact::TreeEnsemble(model) => {
                model.validate()?;
                Ok(Arc::new(model))
            }
        }
    }
}

/// Converts feature vectors to scores, never failing.
#[derive(Debug, Clone, Default)]
pub struct ScorePredictor {
    model: Option<Arc<dyn RegressionModel>>,
}

impl ScorePredictor {
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    pub fn with_model(model: Arc<dyn RegressionModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Loads the configured artifact, if any.
    pub fn from_config(config: &ModelConfig) -> Self {
        match &config.path {
            Some(path) => Self::load(path),
            None => {
                warn!("no zone scoring model configured (ZONE_MODEL_PATH); using neutral score");
                Self::unavailable()
            }
        }
    }

    /// Loads the artifact at `path`; any failure leaves the predictor
    /// without a model.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match ModelArtifact::from_path(path).and_then(ModelArtifact::into_model) {
            Ok(model) => {
                info!(path = %path.display(), kind = model.kind(), "zone scoring model loaded");
                Self::with_model(model)
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "zone scoring model unavailable; using neutral score"
                );
                Self::unavailable()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_kind(&self) -> Option<&'static str> {
        self.model.as_ref().map(|model| model.kind())
    }

    pub fn score(&self, vector: &FeatureVector) -> f64 {
        let Some(model) = &self.model else {
            debug!(postcode = vector.postcode(), "no model loaded; neutral score");
            return PredictionRecord::NEUTRAL_SCORE;
        };

        match model.predict(vector.as_array()) {
            Ok(score) if score.is_finite() => score,
            Ok(score) => {
                warn!(postcode = vector.postcode(), %score, "model produced a non-finite score");
                PredictionRecord::NEUTRAL_SCORE
            }
            Err(err) => {
                warn!(postcode = vector.postcode(), error = %err, "model inference failed");
                PredictionRecord::NEUTRAL_SCORE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::domain::FeatureKind;

    #[derive(Debug)]
    struct FailingModel;

    impl RegressionModel for FailingModel {
        fn kind(&self) -> &'static str {
            "failing"
        }

        fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
            Err(ModelError::Inference("booster corrupted".to_string()))
        }
    }

    #[derive(Debug)]
    struct NanModel;

    impl RegressionModel for NanModel {
        fn kind(&self) -> &'static str {
            "nan"
        }

        fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
            Ok(f64::NAN)
        }
    }

    fn vector() -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        for kind in FeatureKind::ALL {
            values[kind.index()] = kind.default_value();
        }
        FeatureVector::from_parts("2000", values)
    }

    #[test]
    fn missing_model_scores_neutral() {
        let predictor = ScorePredictor::unavailable();
        assert!(!predictor.is_loaded());
        assert_eq!(predictor.score(&vector()), 65.0);
    }

    #[test]
    fn failing_and_non_finite_models_score_neutral() {
        let predictor = ScorePredictor::with_model(Arc::new(FailingModel));
        assert_eq!(predictor.score(&vector()), 65.0);

        let predictor = ScorePredictor::with_model(Arc::new(NanModel));
        assert_eq!(predictor.score(&vector()), 65.0);
    }

    #[test]
    fn load_from_missing_path_leaves_predictor_unavailable() {
        let predictor = ScorePredictor::load("./does-not-exist/zone_predictor.json");
        assert!(!predictor.is_loaded());
        assert_eq!(predictor.model_kind(), None);
    }

    #[test]
    fn unconfigured_model_path_scores_neutral() {
        let predictor = ScorePredictor::from_config(&ModelConfig::default());
        assert!(!predictor.is_loaded());
        assert_eq!(predictor.score(&vector()), 65.0);
    }

    #[test]
    fn artifact_kind_tag_selects_model() {
        let artifact = ModelArtifact::from_reader(
            r#"{ "kind": "linear", "intercept": 10.0, "coefficients": [1, 0, 0, 0, 0, 0, 0, 0] }"#
                .as_bytes(),
        )
        .expect("parse linear");
        let model = artifact.into_model().expect("valid linear");
        assert_eq!(model.kind(), "linear");

        let error = ModelArtifact::from_reader(r#"{ "kind": "random_forest" }"#.as_bytes())
            .expect_err("unknown kind");
        assert!(matches!(error, ModelError::Parse(_)));
    }
}
