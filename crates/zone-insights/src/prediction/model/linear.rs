use serde::{Deserialize, Serialize};

use super::{ModelError, RegressionModel};
use crate::prediction::domain::FEATURE_COUNT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(ModelError::InvalidArtifact(format!(
                "linear model needs {FEATURE_COUNT} coefficients, found {}",
                self.coefficients.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::InvalidArtifact(
                "linear model weights must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl RegressionModel for LinearModel {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(ModelError::Inference(
                "coefficient count does not match feature count".to_string(),
            ));
        }

        let weighted: f64 = self
            .coefficients
            .iter()
            .zip(features.iter())
            .map(|(weight, value)| weight * value)
            .sum();
        Ok(self.intercept + weighted)
    }
}
