use std::{fs::File, io::Read, path::Path};

use log::info;
use serde::{Deserialize, Serialize};

use crate::LiftRightError;

use super::AnomalyModel;

/// Median/IQR scaler exported from training.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RobustScaler {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl RobustScaler {
    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.center.iter().zip(self.scale.iter()))
            .map(|(v, (c, s))| {
                // constant features were fitted with a zero IQR
                let s = if *s == 0.0 { 1.0 } else { *s };
                (v - c) / s
            })
            .collect()
    }
}

/// RBF-kernel one-class SVM in dual form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OneClassSvm {
    pub gamma: f64,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
}

impl OneClassSvm {
    pub fn decision(&self, x: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(self.dual_coef.iter())
            .map(|(sv, coef)| {
                let dist2 = sv
                    .iter()
                    .zip(x.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>();
                coef * (-self.gamma * dist2).exp()
            })
            .sum::<f64>()
            + self.intercept
    }
}

/// Trained scaler, model and decision threshold for one exercise.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise: Option<String>,
    pub features: Vec<String>,
    pub threshold: f64,
    pub scaler: RobustScaler,
    pub model: OneClassSvm,
}

impl ModelBundle {
    pub fn from_reader(reader: impl Read) -> Result<Self, LiftRightError> {
        let bundle: ModelBundle = serde_json::from_reader(reader)
            .map_err(|e| LiftRightError::ModelParseError { source: e })?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn from_file(path: &Path) -> Result<Self, LiftRightError> {
        let file = File::open(path).map_err(|e| LiftRightError::ModelLoadError { source: e })?;
        let bundle = Self::from_reader(file)?;
        info!(
            "Loaded model bundle from {} ({} features, {} support vectors)",
            path.display(),
            bundle.features.len(),
            bundle.model.support_vectors.len()
        );
        Ok(bundle)
    }

    /// Check that every part of the bundle agrees on the feature dimension.
    pub fn validate(&self) -> Result<(), LiftRightError> {
        let dim = self.features.len();
        let shape_error = |reason: String| Err(LiftRightError::ModelShapeMismatch { reason });

        if dim == 0 {
            return shape_error("bundle lists no features".to_string());
        }
        if self.scaler.center.len() != dim || self.scaler.scale.len() != dim {
            return shape_error(format!(
                "scaler has {}/{} parameters for {} features",
                self.scaler.center.len(),
                self.scaler.scale.len(),
                dim
            ));
        }
        if self.model.support_vectors.len() != self.model.dual_coef.len() {
            return shape_error(format!(
                "{} support vectors but {} dual coefficients",
                self.model.support_vectors.len(),
                self.model.dual_coef.len()
            ));
        }
        if let Some(sv) = self.model.support_vectors.iter().find(|sv| sv.len() != dim) {
            return shape_error(format!(
                "support vector of length {} for {} features",
                sv.len(),
                dim
            ));
        }
        if !self.model.gamma.is_finite() || !self.threshold.is_finite() {
            return shape_error("gamma and threshold must be finite".to_string());
        }
        Ok(())
    }
}

impl AnomalyModel for ModelBundle {
    fn features(&self) -> &[String] {
        &self.features
    }

    fn transform(&self, x: &[f64]) -> Vec<f64> {
        self.scaler.transform(x)
    }

    fn decision(&self, x_scaled: &[f64]) -> f64 {
        self.model.decision(x_scaled)
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::tests::single_vector_bundle;
    use proptest::prelude::*;

    const BUNDLE_JSON: &str = r#"{
        "exercise": "bicep_curl",
        "features": ["rom", "duration"],
        "threshold": -0.01,
        "scaler": { "center": [100.0, 1.5], "scale": [20.0, 0.5] },
        "model": {
            "gamma": 0.25,
            "support_vectors": [[0.0, 0.0], [1.0, -1.0]],
            "dual_coef": [0.6, 0.4],
            "intercept": -0.3
        }
    }"#;

    #[test]
    fn test_parse_bundle() {
        let bundle = ModelBundle::from_reader(BUNDLE_JSON.as_bytes()).unwrap();
        assert_eq!(bundle.features, vec!["rom", "duration"]);
        assert_eq!(bundle.exercise.as_deref(), Some("bicep_curl"));
        assert_eq!(bundle.threshold(), -0.01);
    }

    #[test]
    fn test_scaler_transform() {
        let bundle = ModelBundle::from_reader(BUNDLE_JSON.as_bytes()).unwrap();
        assert_eq!(bundle.transform(&[120.0, 1.0]), vec![1.0, -1.0]);
    }

    #[test]
    fn test_zero_scale_is_treated_as_one() {
        let scaler = RobustScaler {
            center: vec![1.0],
            scale: vec![0.0],
        };
        assert_eq!(scaler.transform(&[3.0]), vec![2.0]);
    }

    #[test]
    fn test_decision_function() {
        let bundle = ModelBundle::from_reader(BUNDLE_JSON.as_bytes()).unwrap();
        // at the first support vector: 0.6 + 0.4 * exp(-0.25 * 2) - 0.3
        let expected = 0.6 + 0.4 * (-0.5f64).exp() - 0.3;
        assert!((bundle.score(&[100.0, 1.5]) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut bundle = ModelBundle::from_reader(BUNDLE_JSON.as_bytes()).unwrap();
        bundle.scaler.center.pop();
        assert!(matches!(
            bundle.validate(),
            Err(LiftRightError::ModelShapeMismatch { .. })
        ));

        let mut bundle = ModelBundle::from_reader(BUNDLE_JSON.as_bytes()).unwrap();
        bundle.model.support_vectors[1].push(3.0);
        assert!(matches!(
            bundle.validate(),
            Err(LiftRightError::ModelShapeMismatch { .. })
        ));

        let mut bundle = ModelBundle::from_reader(BUNDLE_JSON.as_bytes()).unwrap();
        bundle.model.dual_coef.push(0.1);
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = ModelBundle::from_reader("{ not json".as_bytes()).unwrap_err();
        assert!(matches!(err, LiftRightError::ModelParseError { .. }));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelBundle::from_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, LiftRightError::ModelLoadError { .. }));
    }

    #[test]
    fn test_bundle_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bicep_curl.json");
        std::fs::write(&path, BUNDLE_JSON).unwrap();
        let bundle = ModelBundle::from_file(&path).unwrap();
        assert_eq!(bundle.model.support_vectors.len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_score_is_deterministic(a in -5.0f64..5.0, b in -5.0f64..5.0) {
            let bundle = single_vector_bundle(&["a", "b"], &[0.0, 0.0]);
            let first = bundle.score(&[a, b]);
            let second = bundle.score(&[a, b]);
            prop_assert_eq!(first.to_bits(), second.to_bits());
            // single positive coefficient bounds the score
            prop_assert!(first <= 0.5 + 1e-12);
            prop_assert!(first >= -0.5);
        }
    }
}
