use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::stats::median;

/// Tuning for the "consistency drifting" signal derived from anomaly scores.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DriftTuning {
    /// Number of recent scores kept for the rolling reference
    pub window: usize,
    /// Scores needed before switching from the model threshold to the rolling median
    pub min_scores_for_relative: usize,
    pub relative_drop: f64,
    pub absolute_margin: f64,
    /// Consecutive low reps before drift is reported
    pub low_streak_for_tip: usize,
}

impl Default for DriftTuning {
    fn default() -> Self {
        Self {
            window: 8,
            min_scores_for_relative: 4,
            relative_drop: 0.02,
            absolute_margin: 0.03,
            low_streak_for_tip: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftVerdict {
    /// Score the current rep was compared against
    pub reference: f64,
    pub relative: bool,
    pub low: bool,
    pub streak: usize,
    /// Drift is reported once the low streak reaches the configured length
    pub drifting: bool,
}

/// Rolling score window with low-score hysteresis.
#[derive(Debug, Clone)]
pub struct DriftTracker {
    tuning: DriftTuning,
    scores: VecDeque<f64>,
    low_streak: usize,
}

impl DriftTracker {
    pub fn new(tuning: DriftTuning) -> Self {
        Self {
            tuning,
            scores: VecDeque::with_capacity(tuning.window.max(1)),
            low_streak: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Record a rep's score and decide whether it is low.
    pub fn observe(&mut self, score: f64, threshold: f64) -> DriftVerdict {
        if self.scores.len() == self.tuning.window.max(1) {
            self.scores.pop_front();
        }
        self.scores.push_back(score);

        let relative = self.scores.len() >= self.tuning.min_scores_for_relative;
        let (reference, low) = match median(self.scores.iter().copied()) {
            Some(reference) if relative => (reference, score < reference - self.tuning.relative_drop),
            _ => (threshold, score < threshold - self.tuning.absolute_margin),
        };

        self.low_streak = if low { self.low_streak + 1 } else { 0 };
        DriftVerdict {
            reference,
            relative,
            low,
            streak: self.low_streak,
            drifting: self.low_streak >= self.tuning.low_streak_for_tip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_absolute_mode_before_enough_scores() {
        let mut tracker = DriftTracker::new(DriftTuning::default());
        let verdict = tracker.observe(-0.05, 0.0);
        assert!(!verdict.relative);
        assert!(verdict.low);
        let verdict = tracker.observe(-0.02, 0.0);
        assert!(!verdict.low);
        assert_eq!(verdict.streak, 0);
    }

    #[test]
    fn test_relative_mode_uses_rolling_median() {
        let mut tracker = DriftTracker::new(DriftTuning::default());
        for _ in 0..3 {
            tracker.observe(0.2, 0.0);
        }
        // far above the model threshold but well below this user's norm
        let verdict = tracker.observe(0.1, 0.0);
        assert!(verdict.relative);
        assert_eq!(verdict.reference, 0.2);
        assert!(verdict.low);
    }

    #[test]
    fn test_drift_needs_consecutive_low_reps() {
        let mut tracker = DriftTracker::new(DriftTuning {
            min_scores_for_relative: 100,
            ..DriftTuning::default()
        });
        assert!(!tracker.observe(-0.1, 0.0).drifting);
        assert!(!tracker.observe(-0.1, 0.0).drifting);
        assert!(!tracker.observe(0.1, 0.0).drifting);
        assert!(!tracker.observe(-0.1, 0.0).drifting);
        assert!(!tracker.observe(-0.1, 0.0).drifting);
        assert!(tracker.observe(-0.1, 0.0).drifting);
    }

    #[test]
    fn test_drift_clears_on_recovery() {
        let mut tracker = DriftTracker::new(DriftTuning::default());
        for _ in 0..4 {
            tracker.observe(-0.1, 0.0);
        }
        let verdict = tracker.observe(0.5, 0.0);
        assert!(!verdict.low);
        assert!(!verdict.drifting);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_window_is_bounded(scores in prop::collection::vec(-1.0f64..1.0, 0..100)) {
            let tuning = DriftTuning::default();
            let mut tracker = DriftTracker::new(tuning);
            for score in scores {
                tracker.observe(score, 0.0);
                prop_assert!(tracker.len() <= tuning.window);
            }
        }
    }
}
