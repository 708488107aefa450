use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    LiftRightError,
    arbitration::{ArbitrationPolicy, TrackedJoint},
    exercise::Exercise,
    fatigue::FatigueTuning,
    scoring::{ClipBounds, DriftTuning},
    segmentation::{Direction, SegmentationTuning, ThresholdStrategy},
    session::baseline::{CalibrationTuning, RepMeasures},
};

const CONFIG_DIR_NAME: &str = "liftright";
const CONFIG_FILE_NAME: &str = "config.json";

pub const SMOOTHING_WINDOW: usize = 7;
pub const MIN_CONFIDENCE: f64 = 0.5;
pub const RECENT_REPS_EXPOSED: usize = 5;
pub const TOP_ISSUES: usize = 2;

/// Baseline-relative per-rep tip triggers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TipTuning {
    /// Range below this fraction of the baseline range
    pub range_drop_ratio: f64,
    /// Duration above this multiple of the baseline duration
    pub tempo_slow_ratio: f64,
    /// Before the baseline is ready, flag reps with less range than this
    #[serde(default)]
    pub min_range_before_baseline: Option<f64>,
    /// Flag reps whose compensation exceeds the baseline by this much
    #[serde(default)]
    pub compensation_growth: Option<f64>,
}

impl Default for TipTuning {
    fn default() -> Self {
        Self {
            range_drop_ratio: 0.55,
            tempo_slow_ratio: 1.8,
            min_range_before_baseline: None,
            compensation_growth: None,
        }
    }
}

/// Everything that differs between exercises apart from the form rules.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExerciseTuning {
    pub segmentation: SegmentationTuning,
    pub arbitration: ArbitrationPolicy,
    #[serde(default)]
    pub clip_bounds: BTreeMap<String, ClipBounds>,
    pub calibration: CalibrationTuning,
    #[serde(default)]
    pub drift: DriftTuning,
    #[serde(default)]
    pub fatigue: FatigueTuning,
    #[serde(default)]
    pub tips: TipTuning,
}

impl ExerciseTuning {
    pub fn defaults_for(exercise: Exercise) -> Self {
        match exercise {
            Exercise::BicepCurl => Self::bicep_curl(),
            Exercise::LateralRaise => Self::lateral_raise(),
            Exercise::ShoulderPress => Self::shoulder_press(),
        }
    }

    fn bicep_curl() -> Self {
        Self {
            segmentation: SegmentationTuning {
                direction: Direction::Decreasing,
                thresholds: ThresholdStrategy::Fixed {
                    activation: 75.0,
                    rest: 155.0,
                },
                min_active_frames: 6,
                max_active_s: 8.0,
                min_rep_gap_s: 0.35,
            },
            arbitration: ArbitrationPolicy::Confidence {
                joint: TrackedJoint::Elbow,
            },
            clip_bounds: BTreeMap::from([(
                "elbow_drift_absmax".to_string(),
                ClipBounds::at_most(0.70),
            )]),
            calibration: CalibrationTuning {
                calib_reps: 5,
                fallback: RepMeasures {
                    range: 120.0,
                    duration: 1.5,
                    compensation: 0.14,
                },
            },
            drift: DriftTuning::default(),
            fatigue: FatigueTuning::default(),
            tips: TipTuning {
                min_range_before_baseline: Some(45.0),
                ..TipTuning::default()
            },
        }
    }

    fn lateral_raise() -> Self {
        Self {
            segmentation: SegmentationTuning {
                direction: Direction::Increasing,
                thresholds: ThresholdStrategy::PercentileBaseline {
                    frames: 90,
                    percentile: 25.0,
                    clamp_lo: -0.35,
                    clamp_hi: 0.10,
                    down_offset: 0.04,
                    up_offset: 0.25,
                },
                min_active_frames: 6,
                max_active_s: 8.0,
                min_rep_gap_s: 0.35,
            },
            arbitration: ArbitrationPolicy::Confidence {
                joint: TrackedJoint::Wrist,
            },
            clip_bounds: BTreeMap::from([
                ("trunk_absmax".to_string(), ClipBounds::at_most(0.55)),
                ("elbow_min".to_string(), ClipBounds::between(60.0, 180.0)),
            ]),
            calibration: CalibrationTuning {
                calib_reps: 5,
                // compensation is degrees of elbow bend, 180 - 145
                fallback: RepMeasures {
                    range: 0.35,
                    duration: 1.6,
                    compensation: 35.0,
                },
            },
            drift: DriftTuning {
                absolute_margin: 0.04,
                ..DriftTuning::default()
            },
            fatigue: FatigueTuning {
                compensation_scale: 25.0,
                ..FatigueTuning::default()
            },
            tips: TipTuning {
                compensation_growth: Some(18.0),
                ..TipTuning::default()
            },
        }
    }

    fn shoulder_press() -> Self {
        Self {
            segmentation: SegmentationTuning {
                direction: Direction::Increasing,
                // rack position sits high in the early frames
                thresholds: ThresholdStrategy::PercentileBaseline {
                    frames: 30,
                    percentile: 75.0,
                    clamp_lo: 0.20,
                    clamp_hi: 1.50,
                    down_offset: -0.05,
                    up_offset: 0.25,
                },
                min_active_frames: 6,
                max_active_s: 6.0,
                min_rep_gap_s: 0.35,
            },
            arbitration: ArbitrationPolicy::Confidence {
                joint: TrackedJoint::Wrist,
            },
            clip_bounds: BTreeMap::from([
                ("trunk_absmax".to_string(), ClipBounds::at_most(0.30)),
                ("wrist_drift_absmax".to_string(), ClipBounds::at_most(0.60)),
            ]),
            calibration: CalibrationTuning {
                calib_reps: 5,
                fallback: RepMeasures {
                    range: 0.8,
                    duration: 1.5,
                    compensation: 0.15,
                },
            },
            drift: DriftTuning {
                absolute_margin: 0.04,
                ..DriftTuning::default()
            },
            fatigue: FatigueTuning::default(),
            tips: TipTuning::default(),
        }
    }
}

/// Engine-wide configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Median filter length applied to the primary signal
    pub smoothing_window: usize,
    /// Frames with a lower mean joint visibility are not used
    pub min_confidence: f64,
    /// Floor for the normalizing shoulder width, in landmark units
    pub min_shoulder_width: f64,
    /// Number of recent reps included in each frame update
    pub recent_reps_exposed: usize,
    pub top_issues: usize,
    pub exercises: BTreeMap<Exercise, ExerciseTuning>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_window: SMOOTHING_WINDOW,
            min_confidence: MIN_CONFIDENCE,
            min_shoulder_width: 0.01,
            recent_reps_exposed: RECENT_REPS_EXPOSED,
            top_issues: TOP_ISSUES,
            exercises: Exercise::ALL
                .into_iter()
                .map(|e| (e, ExerciseTuning::defaults_for(e)))
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn tuning(&self, exercise: Exercise) -> ExerciseTuning {
        self.exercises
            .get(&exercise)
            .cloned()
            .unwrap_or_else(|| ExerciseTuning::defaults_for(exercise))
    }

    pub fn default_path() -> Option<PathBuf> {
        Some(
            dirs::config_dir()?
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        )
    }

    /// Load the user's config file, if one exists.
    pub fn from_local_file() -> Result<Option<Self>, LiftRightError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path).map(Some),
            _ => Ok(None),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LiftRightError> {
        debug!("Loading engine config from {}", path.display());
        let file = File::open(path).map_err(|e| LiftRightError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| LiftRightError::ConfigSerializeError { source: e })
    }

    pub fn save(&self) -> Result<PathBuf, LiftRightError> {
        let path = Self::default_path().ok_or(LiftRightError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), LiftRightError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LiftRightError::ConfigIOError { source: e })?;
        }
        let file = File::create(path).map_err(|e| LiftRightError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| LiftRightError::ConfigSerializeError { source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_cover_every_exercise() {
        let config = EngineConfig::default();
        for exercise in Exercise::ALL {
            assert!(config.exercises.contains_key(&exercise));
        }
        assert_eq!(config.smoothing_window, 7);
        assert_eq!(config.min_confidence, 0.5);
    }

    #[test]
    fn test_curl_thresholds() {
        let tuning = EngineConfig::default().tuning(Exercise::BicepCurl);
        assert_eq!(
            tuning.segmentation.thresholds,
            ThresholdStrategy::Fixed {
                activation: 75.0,
                rest: 155.0
            }
        );
        assert_eq!(tuning.segmentation.direction, Direction::Decreasing);
        assert_eq!(tuning.drift.absolute_margin, 0.03);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = EngineConfig::default();
        config.smoothing_window = 3;
        config
            .exercises
            .get_mut(&Exercise::LateralRaise)
            .unwrap()
            .fatigue
            .stop_index = 90.0;
        config.save_to(&path).unwrap();

        let loaded = EngineConfig::from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "smoothing_window": 5 }"#).unwrap();
        let loaded = EngineConfig::from_path(&path).unwrap();
        assert_eq!(loaded.smoothing_window, 5);
        assert_eq!(loaded.min_confidence, MIN_CONFIDENCE);
        assert_eq!(
            loaded.tuning(Exercise::ShoulderPress),
            ExerciseTuning::defaults_for(Exercise::ShoulderPress)
        );
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "smoothing_window = 5").unwrap();
        assert!(matches!(
            EngineConfig::from_path(&path),
            Err(LiftRightError::ConfigSerializeError { .. })
        ));
        assert!(matches!(
            EngineConfig::from_path(&dir.path().join("missing.json")),
            Err(LiftRightError::ConfigIOError { .. })
        ));
    }
}
