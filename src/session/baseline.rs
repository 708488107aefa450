use log::info;
use serde::{Deserialize, Serialize};

use crate::stats::median_or;

/// Per-rep quantities fatigue is measured on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RepMeasures {
    pub range: f64,
    pub duration: f64,
    /// Exercise-specific compensation, larger is worse
    pub compensation: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTuning {
    /// Clean reps needed to fix the personal baseline
    pub calib_reps: usize,
    /// Used for any baseline value the calibration reps cannot provide
    pub fallback: RepMeasures,
}

/// Personal baseline taken from the first clean reps of a session.
#[derive(Debug, Clone)]
pub struct BaselineCalibrator {
    tuning: CalibrationTuning,
    samples: Vec<RepMeasures>,
    baseline: Option<RepMeasures>,
}

impl BaselineCalibrator {
    pub fn new(tuning: CalibrationTuning) -> Self {
        Self {
            tuning,
            samples: Vec::with_capacity(tuning.calib_reps),
            baseline: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<RepMeasures> {
        self.baseline
    }

    /// Clean reps collected so far and the number required.
    pub fn progress(&self) -> (usize, usize) {
        match self.baseline {
            Some(_) => (self.tuning.calib_reps, self.tuning.calib_reps),
            None => (self.samples.len(), self.tuning.calib_reps),
        }
    }

    /// Offer a completed rep. Reps flagged unsafe are skipped. Returns the
    /// baseline on the rep that completes it.
    pub fn observe(&mut self, measures: RepMeasures, unsafe_rep: bool) -> Option<RepMeasures> {
        if self.baseline.is_some() || unsafe_rep {
            return None;
        }
        self.samples.push(measures);
        if self.samples.len() < self.tuning.calib_reps.max(1) {
            return None;
        }

        let fallback = self.tuning.fallback;
        let baseline = RepMeasures {
            range: median_or(self.samples.iter().map(|m| m.range), fallback.range),
            duration: median_or(self.samples.iter().map(|m| m.duration), fallback.duration),
            compensation: median_or(
                self.samples.iter().map(|m| m.compensation),
                fallback.compensation,
            ),
        };
        info!(
            "Baseline ready after {} clean reps: range={:.3} duration={:.2}s compensation={:.3}",
            self.samples.len(),
            baseline.range,
            baseline.duration,
            baseline.compensation
        );
        self.samples.clear();
        self.baseline = Some(baseline);
        self.baseline
    }
}
