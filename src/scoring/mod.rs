pub mod bundle;
pub mod drift;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::LiftRightError;

pub use bundle::{ModelBundle, OneClassSvm, RobustScaler};
pub use drift::{DriftTracker, DriftTuning, DriftVerdict};

/// Per-rep features keyed by name.
pub type FeatureMap = BTreeMap<&'static str, f64>;

/// Optional lower and upper bound applied to a feature before scoring.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct ClipBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hi: Option<f64>,
}

impl ClipBounds {
    pub fn at_most(hi: f64) -> Self {
        Self { lo: None, hi: Some(hi) }
    }

    pub fn between(lo: f64, hi: f64) -> Self {
        Self {
            lo: Some(lo),
            hi: Some(hi),
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        let value = self.lo.map_or(value, |lo| value.max(lo));
        self.hi.map_or(value, |hi| value.min(hi))
    }
}

/// One-class model contract. `decision` is positive for reps that look like
/// the training data; scores below `threshold` are anomalous.
pub trait AnomalyModel: Send + Sync + Debug {
    /// Feature names in the order the model expects them.
    fn features(&self) -> &[String];
    fn transform(&self, x: &[f64]) -> Vec<f64>;
    fn decision(&self, x_scaled: &[f64]) -> f64;
    fn threshold(&self) -> f64;

    fn score(&self, x: &[f64]) -> f64 {
        self.decision(&self.transform(x))
    }
}

/// Binds a trained model to an exercise's feature extractor.
#[derive(Debug, Clone)]
pub struct RepScorer {
    model: Arc<dyn AnomalyModel>,
    clip_bounds: BTreeMap<String, ClipBounds>,
}

impl RepScorer {
    /// Fails when the model needs a feature the exercise does not produce.
    pub fn new(
        model: Arc<dyn AnomalyModel>,
        available: &[&str],
        clip_bounds: BTreeMap<String, ClipBounds>,
    ) -> Result<Self, LiftRightError> {
        let missing = model
            .features()
            .iter()
            .filter(|f| !available.contains(&f.as_str()))
            .cloned()
            .collect::<Vec<String>>();
        if !missing.is_empty() {
            return Err(LiftRightError::FeatureMismatch { missing });
        }
        Ok(Self { model, clip_bounds })
    }

    pub fn threshold(&self) -> f64 {
        self.model.threshold()
    }

    /// Apply the configured clip bounds in place.
    pub fn clip(&self, features: &mut FeatureMap) {
        for (name, value) in features.iter_mut() {
            if let Some(bounds) = self.clip_bounds.get(*name) {
                *value = bounds.apply(*value);
            }
        }
    }

    /// Score already-clipped features in model order.
    pub fn score(&self, features: &FeatureMap) -> f64 {
        // presence of every feature is checked in `new`
        let x = self
            .model
            .features()
            .iter()
            .map(|name| features.get(name.as_str()).copied().unwrap_or_default())
            .collect::<Vec<f64>>();
        self.model.score(&x)
    }
}
