pub mod filter;
pub mod thresholds;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::landmarks::Side;

pub use filter::MedianFilter;
pub use thresholds::{Direction, ThresholdCalibrator, ThresholdStrategy, Thresholds};

/// Segmentation parameters for one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationTuning {
    pub direction: Direction,
    pub thresholds: ThresholdStrategy,
    /// Confident frames an active phase needs before it counts as a rep
    pub min_active_frames: usize,
    /// Active phases longer than this are discarded
    pub max_active_s: f64,
    /// Closures closer than this to the previous counted rep are duplicates
    pub min_rep_gap_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Resting,
    Active,
}

/// Per-frame input to the segmenter, already reduced to the tracked side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub signal: f64,
    pub drift: f64,
    pub aux: Option<f64>,
    pub confidence: f64,
    pub timestamp_s: f64,
    pub side: Side,
}

/// Coaching issues raised by the form rules on the current frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameIssues {
    pub bad: Vec<String>,
    pub tips: Vec<String>,
}

impl FrameIssues {
    pub fn is_empty(&self) -> bool {
        self.bad.is_empty() && self.tips.is_empty()
    }
}

/// Immutable description of one completed rep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepSummary {
    /// 1-based rep ordinal within the session
    pub index: usize,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub duration_s: f64,
    /// Largest absolute drift seen during the rep
    pub peak_drift: f64,
    pub aux_min: Option<f64>,
    pub aux_max: Option<f64>,
    pub confidence_avg: f64,
    pub frames: usize,
    pub side: Side,
    pub start_s: f64,
    pub end_s: f64,
    pub tip_seen: bool,
    pub bad_seen: bool,
    pub tip_reason: Option<String>,
    pub bad_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    /// Nothing noteworthy happened on this frame
    Idle,
    /// Frame was below the tracking confidence floor
    LowConfidence,
    /// Thresholds are still being calibrated
    Calibrating,
    Activated,
    Completed(RepSummary),
    /// Active phase closed with too few frames
    Dropped { frames: usize },
    /// Closure arrived too soon after the previous rep
    Debounced,
    /// Active phase ran past the maximum duration and was discarded
    Stalled { elapsed_s: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterOutput {
    /// Smoothed signal for this frame, when the frame was confident
    pub smoothed: Option<f64>,
    pub event: SegmentEvent,
}

impl SegmenterOutput {
    fn event(event: SegmentEvent) -> Self {
        Self {
            smoothed: None,
            event,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RestSample {
    value: f64,
    drift: f64,
    aux: Option<f64>,
    confidence: f64,
    timestamp_s: f64,
}

#[derive(Debug, Clone)]
struct ActivePhase {
    start_s: f64,
    activated_s: f64,
    side: Side,
    values: Vec<f64>,
    drifts: Vec<f64>,
    aux: Vec<f64>,
    confidences: Vec<f64>,
    active_frames: usize,
    tip_reason: Option<String>,
    bad_reason: Option<String>,
    tip_seen: bool,
    bad_seen: bool,
}

impl ActivePhase {
    fn open(seed: Option<RestSample>, sample: &FrameSample) -> Self {
        let mut phase = Self {
            start_s: seed.map_or(sample.timestamp_s, |s| s.timestamp_s),
            activated_s: sample.timestamp_s,
            side: sample.side,
            values: Vec::new(),
            drifts: Vec::new(),
            aux: Vec::new(),
            confidences: Vec::new(),
            active_frames: 0,
            tip_reason: None,
            bad_reason: None,
            tip_seen: false,
            bad_seen: false,
        };
        if let Some(seed) = seed {
            phase.values.push(seed.value);
            phase.drifts.push(seed.drift.abs());
            phase.aux.extend(seed.aux);
            phase.confidences.push(seed.confidence);
        }
        phase
    }

    fn push(&mut self, smoothed: f64, sample: &FrameSample, issues: &FrameIssues) {
        self.values.push(smoothed);
        if sample.drift.is_finite() {
            self.drifts.push(sample.drift.abs());
        }
        self.aux.extend(sample.aux.filter(|v| v.is_finite()));
        self.confidences.push(sample.confidence);
        self.active_frames += 1;

        if let Some(reason) = issues.bad.first() {
            self.bad_seen = true;
            self.bad_reason.get_or_insert_with(|| reason.clone());
        }
        if let Some(reason) = issues.tips.first() {
            self.tip_seen = true;
            self.tip_reason.get_or_insert_with(|| reason.clone());
        }
    }

    fn summarize(self, index: usize, end_s: f64) -> RepSummary {
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let aux_min = self.aux.iter().copied().reduce(f64::min);
        let aux_max = self.aux.iter().copied().reduce(f64::max);
        let confidence_avg = if self.confidences.is_empty() {
            0.0
        } else {
            self.confidences.iter().sum::<f64>() / self.confidences.len() as f64
        };

        RepSummary {
            index,
            min,
            max,
            range: max - min,
            duration_s: (end_s - self.start_s).max(0.0),
            peak_drift: self.drifts.iter().copied().fold(0.0, f64::max),
            aux_min,
            aux_max,
            confidence_avg,
            frames: self.values.len(),
            side: self.side,
            start_s: self.start_s,
            end_s,
            tip_seen: self.tip_seen,
            bad_seen: self.bad_seen,
            tip_reason: self.tip_reason,
            bad_reason: self.bad_reason,
        }
    }
}

/// Two-state rep detector over a smoothed primary signal.
///
/// Feed it one [`FrameSample`] per frame in timestamp order. Completed reps
/// come back as [`SegmentEvent::Completed`]; every other outcome is reported
/// so the caller can keep its own counters.
pub struct RepSegmenter {
    tuning: SegmentationTuning,
    min_confidence: f64,
    filter: MedianFilter,
    calibrator: ThresholdCalibrator,
    phase: Option<ActivePhase>,
    last_rest: Option<RestSample>,
    last_counted_close: Option<f64>,
    rep_count: usize,
}

impl RepSegmenter {
    pub fn new(tuning: SegmentationTuning, smoothing_window: usize, min_confidence: f64) -> Self {
        let calibrator = ThresholdCalibrator::new(tuning.thresholds.clone(), tuning.direction);
        Self {
            tuning,
            min_confidence,
            filter: MedianFilter::new(smoothing_window),
            calibrator,
            phase: None,
            last_rest: None,
            last_counted_close: None,
            rep_count: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.phase.is_some() {
            Phase::Active
        } else {
            Phase::Resting
        }
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.calibrator.thresholds()
    }

    pub fn rep_count(&self) -> usize {
        self.rep_count
    }

    /// Side the current active phase was opened on, if any.
    pub fn active_side(&self) -> Option<Side> {
        self.phase.as_ref().map(|p| p.side)
    }

    /// Advance the clock without a usable sample. Discards an active phase
    /// that has outlived the maximum duration.
    pub fn tick(&mut self, now_s: f64) -> Option<SegmentEvent> {
        let elapsed_s = now_s - self.phase.as_ref()?.activated_s;
        if elapsed_s <= self.tuning.max_active_s {
            return None;
        }
        debug!(
            "Active phase exceeded {:.1}s ({:.2}s), resetting",
            self.tuning.max_active_s, elapsed_s
        );
        self.phase = None;
        self.last_rest = None;
        self.filter.clear();
        Some(SegmentEvent::Stalled { elapsed_s })
    }

    pub fn update(&mut self, sample: &FrameSample, issues: &FrameIssues) -> SegmenterOutput {
        if let Some(stalled) = self.tick(sample.timestamp_s) {
            return SegmenterOutput::event(stalled);
        }
        if sample.confidence < self.min_confidence || !sample.signal.is_finite() {
            return SegmenterOutput::event(SegmentEvent::LowConfidence);
        }

        let smoothed = self.filter.push(sample.signal);
        let rest_sample = RestSample {
            value: smoothed,
            drift: sample.drift,
            aux: sample.aux.filter(|v| v.is_finite()),
            confidence: sample.confidence,
            timestamp_s: sample.timestamp_s,
        };

        if !self.calibrator.is_ready() {
            self.calibrator.observe(smoothed);
        }
        let Some(thresholds) = self.calibrator.thresholds() else {
            self.last_rest = Some(rest_sample);
            return SegmenterOutput {
                smoothed: Some(smoothed),
                event: SegmentEvent::Calibrating,
            };
        };

        let direction = self.tuning.direction;
        let event = match self.phase.as_mut() {
            None => {
                if direction.reached(smoothed, thresholds.activation) {
                    let mut phase = ActivePhase::open(self.last_rest, sample);
                    phase.push(smoothed, sample, issues);
                    debug!(
                        "Rep activated at {:.2}s on {} side (signal {:.3})",
                        sample.timestamp_s, sample.side, smoothed
                    );
                    self.phase = Some(phase);
                    SegmentEvent::Activated
                } else {
                    self.last_rest = Some(rest_sample);
                    SegmentEvent::Idle
                }
            }
            Some(phase) => {
                phase.push(smoothed, sample, issues);
                if direction.returned(smoothed, thresholds.rest) {
                    self.last_rest = Some(rest_sample);
                    self.close(sample.timestamp_s)
                } else {
                    SegmentEvent::Idle
                }
            }
        };

        SegmenterOutput {
            smoothed: Some(smoothed),
            event,
        }
    }

    fn close(&mut self, now_s: f64) -> SegmentEvent {
        let Some(phase) = self.phase.take() else {
            return SegmentEvent::Idle;
        };

        if phase.active_frames < self.tuning.min_active_frames {
            debug!(
                "Dropping active phase with {} frames (< {})",
                phase.active_frames, self.tuning.min_active_frames
            );
            return SegmentEvent::Dropped {
                frames: phase.active_frames,
            };
        }
        if let Some(last) = self.last_counted_close {
            if now_s - last < self.tuning.min_rep_gap_s {
                debug!("Debounced closure {:.3}s after previous rep", now_s - last);
                return SegmentEvent::Debounced;
            }
        }

        self.rep_count += 1;
        self.last_counted_close = Some(now_s);
        SegmentEvent::Completed(phase.summarize(self.rep_count, now_s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn curl_tuning() -> SegmentationTuning {
        SegmentationTuning {
            direction: Direction::Decreasing,
            thresholds: ThresholdStrategy::Fixed {
                activation: 75.0,
                rest: 155.0,
            },
            min_active_frames: 6,
            max_active_s: 8.0,
            min_rep_gap_s: 0.35,
        }
    }

    fn sample(signal: f64, t: f64) -> FrameSample {
        FrameSample {
            signal,
            drift: 0.1,
            aux: None,
            confidence: 1.0,
            timestamp_s: t,
            side: Side::Right,
        }
    }

    fn feed(segmenter: &mut RepSegmenter, signals: &[f64], fps: f64, t0: f64) -> Vec<SegmentEvent> {
        signals
            .iter()
            .enumerate()
            .map(|(i, v)| {
                segmenter
                    .update(&sample(*v, t0 + i as f64 / fps), &FrameIssues::default())
                    .event
            })
            .collect()
    }

    fn completed(events: &[SegmentEvent]) -> Vec<RepSummary> {
        events
            .iter()
            .filter_map(|e| match e {
                SegmentEvent::Completed(rep) => Some(rep.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_curl_scenario() {
        let mut segmenter = RepSegmenter::new(curl_tuning(), 1, 0.5);
        let events = feed(
            &mut segmenter,
            &[160.0, 150.0, 120.0, 90.0, 70.0, 65.0, 80.0, 120.0, 150.0, 160.0],
            10.0,
            0.0,
        );
        let reps = completed(&events);
        assert_eq!(reps.len(), 1);
        let rep = &reps[0];
        assert_eq!(rep.index, 1);
        assert_eq!(rep.min, 65.0);
        assert_eq!(rep.max, 160.0);
        assert_eq!(rep.range, 95.0);
        assert!((rep.duration_s - 0.6).abs() < 1e-9);
        assert_eq!(rep.side, Side::Right);
        assert_eq!(segmenter.phase(), Phase::Resting);
    }

    #[test]
    fn test_short_phase_is_dropped() {
        let mut segmenter = RepSegmenter::new(curl_tuning(), 1, 0.5);
        let events = feed(&mut segmenter, &[160.0, 70.0, 65.0, 160.0], 10.0, 0.0);
        assert!(completed(&events).is_empty());
        assert_eq!(events[3], SegmentEvent::Dropped { frames: 3 });
        assert_eq!(segmenter.rep_count(), 0);
    }

    #[test]
    fn test_close_closures_are_debounced() {
        let mut tuning = curl_tuning();
        tuning.min_active_frames = 1;
        let mut segmenter = RepSegmenter::new(tuning, 1, 0.5);
        let events = feed(&mut segmenter, &[160.0, 70.0, 160.0, 70.0, 160.0], 20.0, 0.0);
        assert_eq!(completed(&events).len(), 1);
        assert_eq!(events[4], SegmentEvent::Debounced);
        assert_eq!(segmenter.rep_count(), 1);
    }

    #[test]
    fn test_stalled_phase_emits_nothing() {
        let mut segmenter = RepSegmenter::new(curl_tuning(), 1, 0.5);
        segmenter.update(&sample(160.0, 0.0), &FrameIssues::default());
        for i in 0..10 {
            segmenter.update(&sample(70.0, 0.1 + i as f64 * 0.1), &FrameIssues::default());
        }
        let output = segmenter.update(&sample(160.0, 9.0), &FrameIssues::default());
        assert!(matches!(output.event, SegmentEvent::Stalled { .. }));
        assert_eq!(segmenter.phase(), Phase::Resting);
        assert_eq!(segmenter.rep_count(), 0);
    }

    #[test]
    fn test_tick_resets_during_input_gap() {
        let mut segmenter = RepSegmenter::new(curl_tuning(), 1, 0.5);
        segmenter.update(&sample(160.0, 0.0), &FrameIssues::default());
        segmenter.update(&sample(70.0, 0.1), &FrameIssues::default());
        assert_eq!(segmenter.phase(), Phase::Active);
        assert_eq!(segmenter.tick(5.0), None);
        assert!(matches!(segmenter.tick(8.2), Some(SegmentEvent::Stalled { .. })));
        assert_eq!(segmenter.phase(), Phase::Resting);
    }

    #[test]
    fn test_low_confidence_frames_are_skipped() {
        let mut segmenter = RepSegmenter::new(curl_tuning(), 1, 0.5);
        let issues = FrameIssues::default();
        let signals = [160.0, 150.0, 120.0, 90.0, 70.0, 65.0, 80.0, 120.0, 150.0, 160.0];
        let mut reps = Vec::new();
        for (i, v) in signals.iter().enumerate() {
            let t = i as f64 * 0.1;
            // interleave an unreliable frame claiming a full extension
            let mut noisy = sample(170.0, t + 0.05);
            noisy.confidence = 0.1;
            let out = segmenter.update(&noisy, &issues);
            assert_eq!(out.event, SegmentEvent::LowConfidence);
            if let SegmentEvent::Completed(rep) = segmenter.update(&sample(*v, t), &issues).event {
                reps.push(rep);
            }
        }
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[0].max, 160.0);
        assert_eq!(reps[0].min, 65.0);
    }

    #[test]
    fn test_issues_are_latched_on_the_rep() {
        let mut segmenter = RepSegmenter::new(curl_tuning(), 1, 0.5);
        let signals = [160.0, 150.0, 120.0, 90.0, 70.0, 65.0, 80.0, 120.0, 150.0, 160.0];
        let mut rep = None;
        for (i, v) in signals.iter().enumerate() {
            let issues = if i == 5 {
                FrameIssues {
                    bad: vec!["Elbow drifting forward".to_string()],
                    tips: vec!["Keep elbow tucked".to_string()],
                }
            } else {
                FrameIssues::default()
            };
            if let SegmentEvent::Completed(r) =
                segmenter.update(&sample(*v, i as f64 * 0.1), &issues).event
            {
                rep = Some(r);
            }
        }
        let rep = rep.unwrap();
        assert!(rep.bad_seen);
        assert!(rep.tip_seen);
        assert_eq!(rep.bad_reason.as_deref(), Some("Elbow drifting forward"));
    }

    #[test]
    fn test_issues_while_resting_are_ignored() {
        let mut segmenter = RepSegmenter::new(curl_tuning(), 1, 0.5);
        let bad = FrameIssues {
            bad: vec!["Lean".to_string()],
            tips: vec![],
        };
        segmenter.update(&sample(160.0, 0.0), &bad);
        let signals = [150.0, 120.0, 90.0, 70.0, 65.0, 80.0, 120.0, 150.0, 160.0];
        let mut rep = None;
        for (i, v) in signals.iter().enumerate() {
            if let SegmentEvent::Completed(r) = segmenter
                .update(&sample(*v, 0.1 + i as f64 * 0.1), &FrameIssues::default())
                .event
            {
                rep = Some(r);
            }
        }
        assert!(!rep.unwrap().bad_seen);
    }

    #[test]
    fn test_percentile_thresholds_gate_detection() {
        let tuning = SegmentationTuning {
            direction: Direction::Increasing,
            thresholds: ThresholdStrategy::PercentileBaseline {
                frames: 10,
                percentile: 25.0,
                clamp_lo: -0.35,
                clamp_hi: 0.10,
                down_offset: 0.04,
                up_offset: 0.25,
            },
            min_active_frames: 3,
            max_active_s: 8.0,
            min_rep_gap_s: 0.35,
        };
        let mut segmenter = RepSegmenter::new(tuning, 1, 0.5);
        // a raise during calibration is not counted
        let mut signals = vec![-0.3, 0.2, 0.2, 0.2, -0.3];
        signals.extend([-0.3; 5]);
        let events = feed(&mut segmenter, &signals, 10.0, 0.0);
        assert!(completed(&events).is_empty());
        assert!(segmenter.thresholds().is_some());

        let events = feed(&mut segmenter, &[-0.3, 0.1, 0.2, 0.2, 0.1, -0.3], 10.0, 1.0);
        let reps = completed(&events);
        assert_eq!(reps.len(), 1);
        assert!((reps[0].range - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_side_is_taken_from_activation_frame() {
        let mut segmenter = RepSegmenter::new(curl_tuning(), 1, 0.5);
        let signals = [160.0, 70.0, 65.0, 60.0, 65.0, 70.0, 160.0];
        let mut rep = None;
        for (i, v) in signals.iter().enumerate() {
            let mut s = sample(*v, i as f64 * 0.1);
            s.side = if i == 1 { Side::Left } else { Side::Right };
            if let SegmentEvent::Completed(r) = segmenter.update(&s, &FrameIssues::default()).event {
                rep = Some(r);
            }
        }
        assert_eq!(rep.unwrap().side, Side::Left);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_emitted_reps_are_well_formed(
            signals in prop::collection::vec(40.0f64..180.0, 1..300),
            fps in 5.0f64..60.0,
        ) {
            let tuning = curl_tuning();
            let min_frames = tuning.min_active_frames;
            let max_s = tuning.max_active_s;
            let mut segmenter = RepSegmenter::new(tuning, 3, 0.5);
            let events = feed(&mut segmenter, &signals, fps, 0.0);
            let reps = completed(&events);
            prop_assert_eq!(reps.len(), segmenter.rep_count());
            for (i, rep) in reps.iter().enumerate() {
                prop_assert_eq!(rep.index, i + 1);
                prop_assert!(rep.min <= rep.max);
                prop_assert!(rep.frames >= min_frames);
                // duration includes at most one lead-in frame before activation
                prop_assert!(rep.duration_s <= max_s + 1.0 / fps + 1e-9);
            }
            for pair in reps.windows(2) {
                prop_assert!(pair[1].end_s - pair[0].end_s >= 0.35 - 1e-9);
            }
        }
    }
}
