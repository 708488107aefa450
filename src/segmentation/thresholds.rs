use log::debug;
use serde::{Deserialize, Serialize};

use crate::stats::percentile;

/// Direction the primary signal moves while the user exerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Signal rises during the rep (wrist height on raises and presses)
    Increasing,
    /// Signal falls during the rep (elbow angle on curls)
    Decreasing,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Increasing => 1.0,
            Direction::Decreasing => -1.0,
        }
    }

    /// Whether `value` has crossed the activation threshold.
    pub fn reached(&self, value: f64, activation: f64) -> bool {
        match self {
            Direction::Increasing => value >= activation,
            Direction::Decreasing => value <= activation,
        }
    }

    /// Whether `value` has come back past the rest threshold.
    pub fn returned(&self, value: f64, rest: f64) -> bool {
        match self {
            Direction::Increasing => value <= rest,
            Direction::Decreasing => value >= rest,
        }
    }
}

/// How rest and activation thresholds are obtained for an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdStrategy {
    /// Thresholds known up front.
    Fixed { activation: f64, rest: f64 },
    /// Thresholds derived from a low percentile of the first confident
    /// frames, which are assumed to be spent at the rest position.
    PercentileBaseline {
        frames: usize,
        percentile: f64,
        clamp_lo: f64,
        clamp_hi: f64,
        down_offset: f64,
        up_offset: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Rest-position reference the thresholds were derived from, if any
    pub reference: Option<f64>,
    pub rest: f64,
    pub activation: f64,
}

/// Produces the session's thresholds, calibrating them from early frames when
/// the strategy requires it. Once set they never change.
#[derive(Debug, Clone)]
pub struct ThresholdCalibrator {
    strategy: ThresholdStrategy,
    direction: Direction,
    samples: Vec<f64>,
    thresholds: Option<Thresholds>,
}

impl ThresholdCalibrator {
    pub fn new(strategy: ThresholdStrategy, direction: Direction) -> Self {
        let thresholds = match strategy {
            ThresholdStrategy::Fixed { activation, rest } => Some(Thresholds {
                reference: None,
                rest,
                activation,
            }),
            ThresholdStrategy::PercentileBaseline { .. } => None,
        };
        Self {
            strategy,
            direction,
            samples: Vec::new(),
            thresholds,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.thresholds.is_some()
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds
    }

    /// Number of samples collected towards calibration.
    pub fn samples_seen(&self) -> usize {
        self.samples.len()
    }

    /// Feed a smoothed, confidence-filtered sample. Returns the thresholds on
    /// the frame they become available.
    pub fn observe(&mut self, value: f64) -> Option<Thresholds> {
        if self.thresholds.is_some() || !value.is_finite() {
            return None;
        }
        let ThresholdStrategy::PercentileBaseline {
            frames,
            percentile: pct,
            clamp_lo,
            clamp_hi,
            down_offset,
            up_offset,
        } = self.strategy
        else {
            return None;
        };

        self.samples.push(value);
        if self.samples.len() < frames.max(1) {
            return None;
        }

        let reference = percentile(self.samples.iter().copied(), pct)?.clamp(clamp_lo, clamp_hi);
        let sign = self.direction.sign();
        let rest = reference + sign * down_offset;
        let activation = rest + sign * up_offset;
        let thresholds = Thresholds {
            reference: Some(reference),
            rest,
            activation,
        };
        debug!(
            "Calibrated thresholds from {} frames: reference={:.3} rest={:.3} activation={:.3}",
            self.samples.len(),
            reference,
            rest,
            activation
        );
        self.samples.clear();
        self.thresholds = Some(thresholds);
        Some(thresholds)
    }
}
