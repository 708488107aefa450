use std::collections::VecDeque;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::session::baseline::RepMeasures;
use crate::stats::median_or;

const NEAR_ZERO: f64 = 1e-6;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FatigueWeights {
    pub range: f64,
    pub duration: f64,
    pub compensation: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FatigueTuning {
    /// Capacity of the recent-rep window
    pub window: usize,
    /// Reps the window must hold before the index is computed
    pub min_reps: usize,
    /// Trailing reps whose medians are compared with the baseline
    pub median_of: usize,
    /// Range ratio below which range loss starts to count
    pub range_floor: f64,
    /// Duration ratio above which slowing starts to count
    pub duration_ceiling: f64,
    /// Compensation increase that counts as fully fatigued
    pub compensation_scale: f64,
    pub weights: FatigueWeights,
    pub warn_index: f64,
    pub stop_index: f64,
    /// Consecutive reps at or above `stop_index` before stopping
    pub stop_streak: usize,
}

impl Default for FatigueTuning {
    fn default() -> Self {
        Self {
            window: 6,
            min_reps: 4,
            median_of: 3,
            range_floor: 0.70,
            duration_ceiling: 1.25,
            compensation_scale: 0.25,
            weights: FatigueWeights {
                range: 0.45,
                duration: 0.25,
                compensation: 0.30,
            },
            warn_index: 55.0,
            stop_index: 80.0,
            stop_streak: 2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct FatigueComponents {
    pub range_ratio: f64,
    pub duration_ratio: f64,
    pub compensation_delta: f64,
    pub range: f64,
    pub duration: f64,
    pub compensation: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct FatigueReading {
    /// 0 (fresh) to 100 (strongly fatigued)
    pub index: f64,
    pub components: FatigueComponents,
}

fn ratio(current: f64, baseline: f64) -> f64 {
    if baseline.abs() < NEAR_ZERO {
        return 1.0;
    }
    current / baseline
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Compare recent rep measures against the personal baseline.
pub fn fatigue_index(
    tuning: &FatigueTuning,
    baseline: &RepMeasures,
    current: &RepMeasures,
) -> FatigueReading {
    let range_ratio = ratio(current.range, baseline.range);
    let duration_ratio = ratio(current.duration, baseline.duration);
    let compensation_delta = current.compensation - baseline.compensation;

    let range = unit((tuning.range_floor - range_ratio) / tuning.range_floor);
    let duration = unit((duration_ratio - tuning.duration_ceiling) / tuning.duration_ceiling);
    let compensation = if tuning.compensation_scale.abs() < NEAR_ZERO {
        0.0
    } else {
        unit(compensation_delta / tuning.compensation_scale)
    };

    let weights = tuning.weights;
    let raw = 100.0
        * (weights.range * range + weights.duration * duration + weights.compensation * compensation);
    let index = if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    };

    FatigueReading {
        index,
        components: FatigueComponents {
            range_ratio,
            duration_ratio,
            compensation_delta,
            range,
            duration,
            compensation,
        },
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FatigueStatus {
    pub index: f64,
    pub warning: bool,
    /// Stop threshold held for enough consecutive reps
    pub stop: bool,
    pub since_rep: Option<usize>,
}

/// Warning and stop bookkeeping over successive fatigue readings.
#[derive(Debug, Clone)]
pub struct FatigueTracker {
    tuning: FatigueTuning,
    index: f64,
    since_rep: Option<usize>,
    stop_streak: usize,
    stopped: bool,
}

impl FatigueTracker {
    pub fn new(tuning: FatigueTuning) -> Self {
        Self {
            tuning,
            index: 0.0,
            since_rep: None,
            stop_streak: 0,
            stopped: false,
        }
    }

    pub fn index(&self) -> f64 {
        self.index
    }

    pub fn since_rep(&self) -> Option<usize> {
        self.since_rep
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn observe(&mut self, rep_index: usize, index: f64) -> FatigueStatus {
        self.index = index;
        let warning = index >= self.tuning.warn_index;
        if warning && self.since_rep.is_none() {
            info!("Fatigue warning from rep {rep_index} (index {index:.0})");
            self.since_rep = Some(rep_index);
        }

        self.stop_streak = if index >= self.tuning.stop_index {
            self.stop_streak + 1
        } else {
            0
        };
        if self.stop_streak >= self.tuning.stop_streak.max(1) && !self.stopped {
            warn!(
                "Fatigue stop at rep {rep_index} after {} reps at index >= {:.0}",
                self.stop_streak, self.tuning.stop_index
            );
            self.stopped = true;
        }

        FatigueStatus {
            index,
            warning,
            stop: self.stopped,
            since_rep: self.since_rep,
        }
    }
}

/// Recent-rep window plus tracker. Produces a reading once the baseline is
/// ready and enough reps have been seen.
#[derive(Debug, Clone)]
pub struct FatigueEstimator {
    tuning: FatigueTuning,
    recent: VecDeque<RepMeasures>,
    tracker: FatigueTracker,
}

impl FatigueEstimator {
    pub fn new(tuning: FatigueTuning) -> Self {
        Self {
            tuning,
            recent: VecDeque::with_capacity(tuning.window.max(1)),
            tracker: FatigueTracker::new(tuning),
        }
    }

    pub fn tracker(&self) -> &FatigueTracker {
        &self.tracker
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn record(&mut self, measures: RepMeasures) {
        if self.recent.len() == self.tuning.window.max(1) {
            self.recent.pop_front();
        }
        self.recent.push_back(measures);
    }

    pub fn evaluate(
        &mut self,
        rep_index: usize,
        baseline: Option<&RepMeasures>,
    ) -> Option<(FatigueReading, FatigueStatus)> {
        let baseline = baseline?;
        if self.recent.len() < self.tuning.min_reps {
            return None;
        }

        let tail = self
            .recent
            .iter()
            .skip(self.recent.len().saturating_sub(self.tuning.median_of.max(1)))
            .collect::<Vec<_>>();
        let current = RepMeasures {
            range: median_or(tail.iter().map(|m| m.range), baseline.range),
            duration: median_or(tail.iter().map(|m| m.duration), baseline.duration),
            compensation: median_or(tail.iter().map(|m| m.compensation), baseline.compensation),
        };

        let reading = fatigue_index(&self.tuning, baseline, &current);
        let status = self.tracker.observe(rep_index, reading.index);
        Some((reading, status))
    }
}
