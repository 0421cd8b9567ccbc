//! Scaling and classification of trial features.
//!
//! Both stages are pre-trained elsewhere and loaded from JSON exports:
//!
//! ```json
//! { "mean": [6 numbers], "scale": [6 numbers] }
//! { "coef": [6 numbers], "intercept": 0.0, "threshold": 0.5 }
//! ```

use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::VerifyError;

/// Normalises a raw feature vector.
pub trait Scaler: Send + Sync {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, VerifyError>;
}

/// Decides whether scaled features belong to the claimed speaker.
pub trait Classifier: Send + Sync {
    fn predict(&self, scaled: &[f64]) -> Result<bool, VerifyError>;
}

fn check_len(got: usize) -> Result<(), VerifyError> {
    if got != FEATURE_COUNT {
        return Err(VerifyError::FeatureLength {
            expected: FEATURE_COUNT,
            got,
        });
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(r: &mut dyn Read) -> Result<T, VerifyError> {
    serde_json::from_reader(r).map_err(|e| VerifyError::ArtifactCorrupt(e.to_string()))
}

/// Per-feature standardisation: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, VerifyError> {
        check_len(mean.len())?;
        check_len(scale.len())?;
        Ok(Self { mean, scale })
    }

    /// Loads a scaler export and checks it against the feature layout.
    pub fn from_json(r: &mut dyn Read) -> Result<Self, VerifyError> {
        let raw: Self = read_json(r)?;
        Self::new(raw.mean, raw.scale)
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, VerifyError> {
        check_len(features.len())?;
        Ok(features
            .iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((&x, &m), &s)| {
                // Constant features were fitted with zero variance.
                let s = if s == 0.0 { 1.0 } else { s };
                (x - m) / s
            })
            .collect())
    }
}

fn default_threshold() -> f64 {
    0.5
}

/// Logistic regression: verified iff `sigmoid(coef · x + intercept) >= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub coef: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl LogisticClassifier {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Result<Self, VerifyError> {
        check_len(coef.len())?;
        Ok(Self {
            coef,
            intercept,
            threshold: default_threshold(),
        })
    }

    /// Loads a classifier export and checks it against the feature layout.
    pub fn from_json(r: &mut dyn Read) -> Result<Self, VerifyError> {
        let raw: Self = read_json(r)?;
        check_len(raw.coef.len())?;
        if !(0.0..=1.0).contains(&raw.threshold) {
            return Err(VerifyError::ArtifactCorrupt(format!(
                "threshold {} outside [0, 1]",
                raw.threshold
            )));
        }
        Ok(raw)
    }

    /// Probability that the features belong to the claimed speaker.
    pub fn probability(&self, scaled: &[f64]) -> Result<f64, VerifyError> {
        check_len(scaled.len())?;
        let z: f64 = self
            .coef
            .iter()
            .zip(scaled)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

impl Classifier for LogisticClassifier {
    fn predict(&self, scaled: &[f64]) -> Result<bool, VerifyError> {
        Ok(self.probability(scaled)? >= self.threshold)
    }
}

/// Scaler followed by classifier. Either stage may be absent until loaded.
#[derive(Clone, Default)]
pub struct DecisionEngine {
    scaler: Option<Arc<dyn Scaler>>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl DecisionEngine {
    pub fn new(scaler: Arc<dyn Scaler>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            scaler: Some(scaler),
            classifier: Some(classifier),
        }
    }

    /// An engine with neither stage loaded; scoring fails until both are set.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_scaler(mut self, scaler: Arc<dyn Scaler>) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Fails fast if a stage is missing.
    pub fn ensure_ready(&self) -> Result<(), VerifyError> {
        if self.scaler.is_none() {
            return Err(VerifyError::ScalerNotLoaded);
        }
        if self.classifier.is_none() {
            return Err(VerifyError::ClassifierNotLoaded);
        }
        Ok(())
    }

    pub fn score(&self, features: &FeatureVector) -> Result<bool, VerifyError> {
        let scaler = self.scaler.as_ref().ok_or(VerifyError::ScalerNotLoaded)?;
        let classifier = self.classifier.as_ref().ok_or(VerifyError::ClassifierNotLoaded)?;
        let scaled = scaler.transform(features.as_slice())?;
        classifier.predict(&scaled)
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("scaler", &self.scaler.is_some())
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}
