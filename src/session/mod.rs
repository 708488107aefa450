pub mod baseline;
pub mod feedback;
pub mod issues;
pub mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use simple_moving_average::{SMA, SumTreeSMA};

use crate::{
    LiftRightError,
    arbitration::{SideArbiter, SideCandidate},
    config::{EngineConfig, TipTuning},
    exercise::{Exercise, ExerciseProfile, RepTip, SideSignal, profile_for},
    fatigue::FatigueEstimator,
    landmarks::{BodyMetrics, LandmarkFrame, Side, extract_body_metrics},
    scoring::{AnomalyModel, DriftTracker, RepScorer},
    segmentation::{FrameSample, Phase, RepSegmenter, RepSummary, SegmentEvent},
};

use baseline::{BaselineCalibrator, RepMeasures};
use feedback::{FeedbackEvent, FeedbackType, FormLabel, MAX_REASONS, RepRecord, Severity, praise};
use issues::{IssueCount, IssueCounters, IssueKind, IssueLevel};

pub use registry::{SessionRegistry, SessionToken};

const CONFIDENCE_WINDOW: usize = 15;
const NO_ISSUES_TEXT: &str = "no major issues";

/// Caller-side identifiers carried through to the summary.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub log_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Rep thresholds are not known yet
    Calibrating,
    Running,
    /// Fatigue stop reached, no further frames are accepted
    Stopped,
}

/// Result of processing one frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub timestamp_s: f64,
    pub feedback_text: String,
    pub severity: Severity,
    pub rep_count: usize,
    /// Set only on the frame that completed a rep
    pub latest_rep: Option<RepRecord>,
    /// Text describing the most recent rep, kept until the next one
    pub last_rep_text: Option<String>,
    pub fatigue_index: f64,
    pub fatigue_warning: bool,
    pub baseline_ready: bool,
    pub top_issues_text: String,
    /// Rolling mean tracking confidence
    pub confidence: f64,
    pub state: SessionState,
    pub phase: Phase,
    pub recent_reps: Vec<RepRecord>,
}

/// Aggregate returned when a session finishes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub exercise: Exercise,
    pub identity: SessionIdentity,
    pub reps_total: usize,
    /// Every rep that was not unsafe, warnings included
    pub reps_good: usize,
    pub reps_bad: usize,
    pub reps_warn: usize,
    /// Danger-level feedback events
    pub form_error_count: usize,
    pub fatigue_flag: bool,
    pub fatigue_since_rep: Option<usize>,
    pub stop_reason: Option<String>,
    pub issue_counts: BTreeMap<IssueKind, IssueCount>,
    pub top_issues: Vec<(IssueKind, usize)>,
    pub baseline: Option<RepMeasures>,
    pub reps: Vec<RepRecord>,
    pub feedback: Vec<FeedbackEvent>,
}

/// What a completed rep changed, ready to be folded into the frame update.
struct RepOutcome {
    record: RepRecord,
    text: String,
    severity: Severity,
}

/// Live state for one tracked set.
///
/// Frames must be applied in capture order. The session owns every stateful
/// component for its exercise and is driven one frame at a time by
/// [`Session::update`].
pub struct Session {
    token: SessionToken,
    exercise: Exercise,
    identity: SessionIdentity,
    min_confidence: f64,
    min_shoulder_width: f64,
    recent_reps_exposed: usize,
    top_issues: usize,
    tips: TipTuning,
    profile: Box<dyn ExerciseProfile>,
    segmenter: RepSegmenter,
    arbiter: SideArbiter,
    scorer: RepScorer,
    calibrator: BaselineCalibrator,
    fatigue: FatigueEstimator,
    drift: DriftTracker,
    counters: IssueCounters,
    confidence: SumTreeSMA<f64, f64, CONFIDENCE_WINDOW>,
    fatigue_warning: bool,
    reps: Vec<RepRecord>,
    feedback: Vec<FeedbackEvent>,
    last_rep_text: Option<String>,
    stop_reason: Option<String>,
}

impl Session {
    /// Fails when `model` needs a feature the exercise does not compute.
    pub fn new(
        token: SessionToken,
        exercise: Exercise,
        identity: SessionIdentity,
        config: &EngineConfig,
        model: Arc<dyn AnomalyModel>,
    ) -> Result<Self, LiftRightError> {
        let tuning = config.tuning(exercise);
        let profile = profile_for(exercise);
        let scorer = RepScorer::new(model, profile.feature_names(), tuning.clip_bounds.clone())?;

        Ok(Self {
            token,
            exercise,
            identity,
            min_confidence: config.min_confidence,
            min_shoulder_width: config.min_shoulder_width,
            recent_reps_exposed: config.recent_reps_exposed,
            top_issues: config.top_issues,
            tips: tuning.tips,
            profile,
            segmenter: RepSegmenter::new(
                tuning.segmentation.clone(),
                config.smoothing_window,
                config.min_confidence,
            ),
            arbiter: SideArbiter::new(tuning.arbitration),
            scorer,
            calibrator: BaselineCalibrator::new(tuning.calibration),
            fatigue: FatigueEstimator::new(tuning.fatigue),
            drift: DriftTracker::new(tuning.drift),
            counters: IssueCounters::new(),
            confidence: SumTreeSMA::new(),
            fatigue_warning: false,
            reps: Vec::new(),
            feedback: Vec::new(),
            last_rep_text: None,
            stop_reason: None,
        })
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn exercise(&self) -> Exercise {
        self.exercise
    }

    pub fn rep_count(&self) -> usize {
        self.reps.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_reason.is_some()
    }

    pub fn counters(&self) -> &IssueCounters {
        &self.counters
    }

    pub fn update(&mut self, frame: &LandmarkFrame) -> Result<FrameUpdate, LiftRightError> {
        if self.is_stopped() {
            warn!("Rejecting frame for stopped session {}", self.token);
            return Err(LiftRightError::SessionTerminated {
                token: self.token.to_string(),
            });
        }
        let now = frame.timestamp_s;

        let metrics = frame.landmarks.as_ref().and_then(|joints| {
            extract_body_metrics(
                now,
                joints,
                self.profile.confidence_joints(),
                self.min_shoulder_width,
            )
        });
        let body = match metrics {
            Some(body) if body.confidence >= self.min_confidence => body,
            other => {
                let text = match other {
                    Some(body) => {
                        self.confidence.add_sample(body.confidence);
                        format!("Tracking quality low ({:.2})", body.confidence)
                    }
                    None => {
                        self.confidence.add_sample(0.0);
                        "No pose detected".to_string()
                    }
                };
                self.counters.record(IssueKind::TrackingLow, IssueLevel::Warn);
                if let Some(SegmentEvent::Stalled { elapsed_s }) = self.segmenter.tick(now) {
                    self.on_stall(elapsed_s);
                }
                return Ok(self.frame_update(now, text, Severity::Warning, None));
            }
        };
        self.confidence.add_sample(body.confidence);

        let assessment = self.profile.assess_frame(&body, &mut self.counters);
        let (side, signal) = self.arbitrate(&body);
        let sample = FrameSample {
            signal: signal.signal,
            drift: signal.drift,
            aux: signal.aux,
            confidence: body.confidence,
            timestamp_s: now,
            side,
        };

        let output = self.segmenter.update(&sample, &assessment.issues);
        let (mut text, mut severity) = (assessment.text, assessment.severity);
        let mut latest = None;
        match output.event {
            SegmentEvent::Activated => self.arbiter.lock(side),
            SegmentEvent::Completed(rep) => {
                self.arbiter.unlock();
                let outcome = self.close_rep(rep);
                text = outcome.text;
                severity = outcome.severity;
                latest = Some(outcome.record);
            }
            SegmentEvent::Stalled { elapsed_s } => self.on_stall(elapsed_s),
            SegmentEvent::Dropped { .. } | SegmentEvent::Debounced => self.arbiter.unlock(),
            SegmentEvent::Idle | SegmentEvent::LowConfidence | SegmentEvent::Calibrating => {}
        }

        Ok(self.frame_update(now, text, severity, latest))
    }

    /// Close the session and produce its summary.
    pub fn finish(self) -> SessionSummary {
        let reps_total = self.reps.len();
        let reps_bad = self.count_label(FormLabel::Bad);
        let reps_warn = self.count_label(FormLabel::Warning);
        let form_error_count = self
            .feedback
            .iter()
            .filter(|f| f.severity == Severity::Danger)
            .count();
        let tracker = self.fatigue.tracker();
        info!(
            "Session {} finished: {} reps ({} bad, {} warning)",
            self.token, reps_total, reps_bad, reps_warn
        );

        SessionSummary {
            exercise: self.exercise,
            reps_total,
            reps_good: reps_total - reps_bad,
            reps_bad,
            reps_warn,
            form_error_count,
            fatigue_flag: tracker.stopped(),
            fatigue_since_rep: tracker.since_rep(),
            stop_reason: self.stop_reason,
            issue_counts: self.counters.counts().clone(),
            top_issues: self.counters.top(self.top_issues),
            baseline: self.calibrator.baseline(),
            identity: self.identity,
            reps: self.reps,
            feedback: self.feedback,
        }
    }

    fn count_label(&self, label: FormLabel) -> usize {
        self.reps.iter().filter(|r| r.form_label == label).count()
    }

    fn arbitrate(&mut self, body: &BodyMetrics) -> (Side, SideSignal) {
        let left = self.profile.side_signal(body, Side::Left);
        let right = self.profile.side_signal(body, Side::Right);
        let candidate = |side: Side, signal: &SideSignal| {
            let arm = body.side(side);
            SideCandidate {
                signal: signal.signal,
                drift: signal.drift,
                elbow_visibility: arm.elbow_visibility,
                wrist_visibility: arm.wrist_visibility,
            }
        };
        let side = self
            .arbiter
            .choose(&candidate(Side::Left, &left), &candidate(Side::Right, &right));
        match side {
            Side::Left => (side, left),
            Side::Right => (side, right),
        }
    }

    fn on_stall(&mut self, elapsed_s: f64) {
        debug!("Session {} discarded a {elapsed_s:.1}s active phase", self.token);
        self.arbiter.unlock();
        self.counters.record(IssueKind::StalledRep, IssueLevel::Warn);
    }

    fn close_rep(&mut self, rep: RepSummary) -> RepOutcome {
        let mut features = self.profile.rep_features(&rep);
        self.scorer.clip(&mut features);
        let measures = RepMeasures {
            range: rep.range,
            duration: rep.duration_s,
            compensation: self.profile.compensation(&features),
        };

        self.calibrator.observe(measures, rep.bad_seen);
        let score = self.scorer.score(&features);

        self.fatigue.record(measures);
        let baseline = self.calibrator.baseline();
        let status = self
            .fatigue
            .evaluate(rep.index, baseline.as_ref())
            .map(|(_, status)| status);
        self.fatigue_warning = status.is_some_and(|s| s.warning);
        let fatigue_index = self.fatigue.tracker().index();

        let drift = self.drift.observe(score, self.scorer.threshold());
        let rep_tips = self.rep_tips(&measures, baseline.as_ref(), drift.drifting);
        let tip_texts = rep_tips
            .iter()
            .map(|tip| self.profile.tip_text(*tip).to_string())
            .collect::<Vec<_>>();

        let mut reasons = Vec::new();
        if rep.bad_seen {
            reasons.push(
                rep.bad_reason
                    .clone()
                    .unwrap_or_else(|| "unsafe form".to_string()),
            );
        }
        if let Some(reason) = rep.tip_reason.as_ref().filter(|_| rep.tip_seen) {
            reasons.push(reason.clone());
        }
        reasons.extend(tip_texts.iter().take(2).cloned());
        reasons.truncate(MAX_REASONS);

        let form_label = if rep.bad_seen {
            FormLabel::Bad
        } else if rep.tip_seen || drift.drifting || !rep_tips.is_empty() {
            FormLabel::Warning
        } else {
            FormLabel::Good
        };

        let coaching = rep.tip_seen || drift.drifting;
        let text = if rep.bad_seen {
            format!(
                "Rep {}: UNSAFE - {}",
                rep.index,
                rep.bad_reason.as_deref().unwrap_or("adjust form")
            )
        } else if coaching {
            let reason = rep
                .tip_reason
                .as_deref()
                .or(tip_texts.first().map(String::as_str))
                .unwrap_or("small adjustment");
            format!("Rep {}: COACHING - {reason}", rep.index)
        } else {
            format!(
                "Rep {}: {}",
                rep.index,
                praise(rep.index, self.profile.general_tips())
            )
        };

        let record = RepRecord {
            rep_index: rep.index,
            duration_ms: (rep.duration_s * 1000.0).round().max(0.0) as u64,
            range: rep.range,
            peak_drift: rep.peak_drift,
            confidence_avg: rep.confidence_avg,
            form_label,
            anomaly_score: score,
            fatigue_index,
            side: rep.side,
            tip_seen: rep.tip_seen,
            bad_seen: rep.bad_seen,
            ml_drift: drift.drifting,
            reasons,
        };
        info!(
            "Rep {} on {} side: {} (range {:.3}, {:.2}s, score {:.3}, fatigue {:.0})",
            rep.index, rep.side, form_label, rep.range, rep.duration_s, score, fatigue_index
        );

        if rep.bad_seen {
            self.feedback.push(FeedbackEvent {
                feedback_type: FeedbackType::Posture,
                severity: Severity::Danger,
                feedback_text: rep
                    .bad_reason
                    .clone()
                    .unwrap_or_else(|| "Unsafe form detected".to_string()),
                rep: rep.index,
                meta: json!({ "rep": rep.index }),
            });
        } else if let Some(first) = record.reasons.first() {
            self.feedback.push(FeedbackEvent {
                feedback_type: FeedbackType::Posture,
                severity: if coaching {
                    Severity::Warning
                } else {
                    Severity::Info
                },
                feedback_text: first.clone(),
                rep: rep.index,
                meta: json!({ "rep": rep.index, "all": record.reasons }),
            });
        }

        let mut severity = form_label.severity();
        let mut text = text;
        if let Some(status) = status.filter(|s| s.stop) {
            let since = status.since_rep.unwrap_or(rep.index);
            let top = self.counters.top(self.top_issues);
            let message = format!(
                "Stop recommended. Strong fatigue detected since Rep {since}. Top issues: {}. Please rest or reduce weight.",
                self.counters
                    .top_text(self.top_issues)
                    .unwrap_or_else(|| "no dominant issue".to_string())
            );
            warn!("Session {} stopped at rep {}: {message}", self.token, rep.index);
            self.feedback.push(FeedbackEvent {
                feedback_type: FeedbackType::Fatigue,
                severity: Severity::Warning,
                feedback_text: message.clone(),
                rep: rep.index,
                meta: json!({
                    "since_rep": since,
                    "top_issues": top,
                    "fatigue_index": status.index,
                }),
            });
            self.stop_reason = Some(message.clone());
            text = message;
            severity = Severity::Danger;
        }

        self.last_rep_text = Some(text.clone());
        self.reps.push(record.clone());
        RepOutcome {
            record,
            text,
            severity,
        }
    }

    fn rep_tips(
        &self,
        measures: &RepMeasures,
        baseline: Option<&RepMeasures>,
        drifting: bool,
    ) -> Vec<RepTip> {
        let mut tips = Vec::new();
        if self.fatigue_warning {
            tips.push(RepTip::FatigueTrend);
        }
        match baseline {
            Some(baseline) => {
                if measures.range < self.tips.range_drop_ratio * baseline.range {
                    tips.push(RepTip::RangeDropping);
                }
                if measures.duration > self.tips.tempo_slow_ratio * baseline.duration {
                    tips.push(RepTip::TempoSlowing);
                }
                if let Some(growth) = self.tips.compensation_growth {
                    if measures.compensation > baseline.compensation + growth {
                        tips.push(RepTip::CompensationGrowing);
                    }
                }
            }
            None => {
                if let Some(min_range) = self.tips.min_range_before_baseline {
                    if measures.range < min_range {
                        tips.push(RepTip::RangeTooSmall);
                    }
                }
            }
        }
        if drifting {
            tips.push(RepTip::ConsistencyDrifting);
        }
        tips
    }

    fn frame_update(
        &self,
        timestamp_s: f64,
        feedback_text: String,
        severity: Severity,
        latest_rep: Option<RepRecord>,
    ) -> FrameUpdate {
        let state = if self.is_stopped() {
            SessionState::Stopped
        } else if self.segmenter.thresholds().is_none() {
            SessionState::Calibrating
        } else {
            SessionState::Running
        };
        let recent_reps = self
            .reps
            .iter()
            .skip(self.reps.len().saturating_sub(self.recent_reps_exposed))
            .cloned()
            .collect();

        FrameUpdate {
            timestamp_s,
            feedback_text,
            severity,
            rep_count: self.reps.len(),
            latest_rep,
            last_rep_text: self.last_rep_text.clone(),
            fatigue_index: self.fatigue.tracker().index(),
            fatigue_warning: self.fatigue_warning,
            baseline_ready: self.calibrator.is_ready(),
            top_issues_text: self
                .counters
                .top_text(self.top_issues)
                .unwrap_or_else(|| NO_ISSUES_TEXT.to_string()),
            confidence: self.confidence.get_average(),
            state,
            phase: self.segmenter.phase(),
            recent_reps,
        }
    }
}
