//! Holds one loaded model artifact and turns a `FeatureVector` into a
//! `Prediction`. Training is out of scope; this is a consumer of an
//! externally produced weights file.

use serde::{Deserialize, Serialize};

use crate::model::features::{FEATURE_COUNT, FEATURE_NAMES};
use crate::model::prediction::Prediction;
use crate::model::FeatureVector;
use crate::utils::errors::PipelineError;

/// On-disk shape of the model artifact: per-feature linear weights plus a
/// bias, scored through a logistic link. Gradient-boosted trees are the
/// production artifact; this linear/logistic form is what a distilled or
/// calibration-layer export of one looks like, and is sufficient to
/// exercise the predictor contract end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub version: String,
}

impl ModelArtifact {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.feature_names.len() != FEATURE_COUNT || self.weights.len() != FEATURE_COUNT {
            return Err(PipelineError::FeatureSchemaMismatch {
                expected: FEATURE_COUNT,
                actual: self.feature_names.len(),
            });
        }
        if self.feature_names.iter().zip(FEATURE_NAMES.iter()).any(|(a, b)| a != b) {
            return Err(PipelineError::FeatureSchemaMismatch {
                expected: FEATURE_COUNT,
                actual: self.feature_names.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Predictor {
    artifact: Option<ModelArtifact>,
}

impl Predictor {
    pub fn new() -> Self {
        Self { artifact: None }
    }

    pub fn load(&mut self, artifact: ModelArtifact) -> Result<(), PipelineError> {
        artifact.validate()?;
        self.artifact = Some(artifact);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn predict(&self, fv: &FeatureVector) -> Result<Prediction, PipelineError> {
        let artifact = self.artifact.as_ref().ok_or(PipelineError::ModelNotLoaded)?;
        let inputs = fv.as_array();
        if inputs.len() != artifact.weights.len() {
            return Err(PipelineError::FeatureSchemaMismatch {
                expected: artifact.weights.len(),
                actual: inputs.len(),
            });
        }
        let logit: f64 =
            artifact.bias + inputs.iter().zip(artifact.weights.iter()).map(|(x, w)| x * w).sum::<f64>();
        let up_prob = 1.0 / (1.0 + (-logit).exp());
        Ok(Prediction::from_probs(up_prob, 1.0 - up_prob))
    }
}
