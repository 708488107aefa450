use crate::{
    landmarks::{BodyMetrics, Joint, Side},
    scoring::FeatureMap,
    segmentation::{FrameIssues, RepSummary},
    session::issues::{IssueCounters, IssueKind, IssueLevel},
    stats::median,
};

use super::{Exercise, ExerciseProfile, FrameAssessment, RepTip, SideSignal, StreakRule, describe};

const TRUNK_WARN: f64 = 0.12;
const TRUNK_BAD: f64 = 0.20;

const ASYM_WARN: f64 = 0.18;
const ASYM_BAD: f64 = 0.28;

const ELBOW_WARN: f64 = 120.0;
const ELBOW_BAD: f64 = 95.0;

// forward/back lean shows up as the torso getting shorter on camera
const TORSO_BASELINE_FRAMES: usize = 90;
const TORSO_COMP_WARN_DROP: f64 = 0.04;
const TORSO_COMP_BAD_DROP: f64 = 0.07;
const TORSO_COMP_MIN_BASE: f64 = 0.60;

const STRAIGHT_ARM_DEG: f64 = 180.0;

const FEATURES: [&str; 4] = ["wrist_rel_range", "duration", "trunk_absmax", "elbow_min"];

const GENERAL_TIPS: [&str; 5] = [
    "Keep shoulders down and relaxed.",
    "Lead with elbows slightly.",
    "Control the way down (eccentric).",
    "Avoid swinging your torso.",
    "Stop around shoulder height.",
];

/// Wrist-height driven raise with streak-based posture rules.
pub struct LateralRaise {
    torso_samples: Vec<f64>,
    torso_baseline: Option<f64>,
    trunk: StreakRule,
    tilt: StreakRule,
    asymmetry: StreakRule,
    elbow_right: StreakRule,
    elbow_left: StreakRule,
}

impl LateralRaise {
    pub fn new() -> Self {
        Self {
            torso_samples: Vec::with_capacity(TORSO_BASELINE_FRAMES),
            torso_baseline: None,
            trunk: StreakRule::above(TRUNK_WARN, TRUNK_BAD),
            tilt: StreakRule::above(TORSO_COMP_WARN_DROP, TORSO_COMP_BAD_DROP),
            asymmetry: StreakRule::above(ASYM_WARN, ASYM_BAD),
            elbow_right: StreakRule::below(ELBOW_WARN, ELBOW_BAD),
            elbow_left: StreakRule::below(ELBOW_WARN, ELBOW_BAD),
        }
    }

    pub fn torso_baseline(&self) -> Option<f64> {
        self.torso_baseline
    }

    fn observe_torso(&mut self, torso_height: f64) {
        if self.torso_baseline.is_some() || !torso_height.is_finite() {
            return;
        }
        self.torso_samples.push(torso_height);
        if self.torso_samples.len() >= TORSO_BASELINE_FRAMES {
            self.torso_baseline = median(self.torso_samples.drain(..))
                .map(|h| h.max(TORSO_COMP_MIN_BASE));
        }
    }
}

impl Default for LateralRaise {
    fn default() -> Self {
        Self::new()
    }
}

fn push_issue(issues: &mut FrameIssues, level: Option<IssueLevel>, bad: &str, tip: &str) {
    match level {
        Some(IssueLevel::Bad) => issues.bad.push(bad.to_string()),
        Some(IssueLevel::Warn) => issues.tips.push(tip.to_string()),
        None => {}
    }
}

impl ExerciseProfile for LateralRaise {
    fn exercise(&self) -> Exercise {
        Exercise::LateralRaise
    }

    fn confidence_joints(&self) -> &'static [Joint] {
        &Joint::REQUIRED
    }

    fn side_signal(&self, body: &BodyMetrics, side: Side) -> SideSignal {
        let arm = body.side(side);
        SideSignal {
            signal: arm.wrist_rel_y,
            drift: body.trunk_offset.abs(),
            aux: Some(arm.elbow_angle),
        }
    }

    fn assess_frame(
        &mut self,
        body: &BodyMetrics,
        counters: &mut IssueCounters,
    ) -> FrameAssessment {
        self.observe_torso(body.torso_height);

        let mut issues = FrameIssues::default();

        let trunk = self.trunk.update(body.trunk_offset.abs());
        if let Some(level) = trunk {
            counters.record(IssueKind::SideLean, level);
        }
        push_issue(
            &mut issues,
            trunk,
            "Avoid leaning / swinging (side-to-side)",
            "Reduce torso swing",
        );

        if let Some(base) = self.torso_baseline {
            let drop = (base - body.torso_height) / (base + 1e-6);
            let tilt = self.tilt.update(drop);
            if let Some(level) = tilt {
                counters.record(IssueKind::ForwardLean, level);
            }
            push_issue(
                &mut issues,
                tilt,
                "Don't hinge forward/back (stay upright)",
                "Stay upright (avoid forward lean)",
            );
        }

        let asym = self.asymmetry.update(body.wrist_asymmetry());
        if let Some(level) = asym {
            counters.record(IssueKind::ArmAsymmetry, level);
        }
        push_issue(&mut issues, asym, "Raise both arms evenly", "Even out both arms");

        let mut worst_elbow = None;
        for side in [Side::Right, Side::Left] {
            let rule = match side {
                Side::Right => &mut self.elbow_right,
                Side::Left => &mut self.elbow_left,
            };
            if let Some(level) = rule.update(body.side(side).elbow_angle) {
                counters.record(IssueKind::elbow_bend(side), level);
                worst_elbow = worst_elbow.max(Some(level));
            }
        }

        // posture problems take the headline, elbow bend only when nothing else
        let (mut text, mut severity) = describe(&issues);
        let mut elbow_issues = FrameIssues::default();
        push_issue(
            &mut elbow_issues,
            worst_elbow,
            "Don't curl (elbow too bent)",
            "Keep arms straighter",
        );
        if issues.is_empty() && !elbow_issues.is_empty() {
            (text, severity) = describe(&elbow_issues);
        }
        issues.bad.extend(elbow_issues.bad);
        issues.tips.extend(elbow_issues.tips);

        FrameAssessment {
            issues,
            text,
            severity,
        }
    }

    fn feature_names(&self) -> &'static [&'static str] {
        &FEATURES
    }

    fn rep_features(&self, rep: &RepSummary) -> FeatureMap {
        FeatureMap::from([
            ("wrist_rel_range", rep.range),
            ("duration", rep.duration_s),
            ("trunk_absmax", rep.peak_drift),
            ("elbow_min", rep.aux_min.unwrap_or(STRAIGHT_ARM_DEG)),
        ])
    }

    fn compensation(&self, features: &FeatureMap) -> f64 {
        STRAIGHT_ARM_DEG - features.get("elbow_min").copied().unwrap_or(STRAIGHT_ARM_DEG)
    }

    fn general_tips(&self) -> &'static [&'static str] {
        &GENERAL_TIPS
    }

    fn tip_text(&self, tip: RepTip) -> &'static str {
        match tip {
            RepTip::CompensationGrowing => "Arms bending more - avoid upright-row motion",
            RepTip::RangeTooSmall => "Raise a little higher (if comfortable)",
            RepTip::FatigueTrend => "Fatigue trend - consider rest or lighter weight",
            RepTip::RangeDropping => "Range dropping - lighten weight or rest",
            RepTip::TempoSlowing => "Tempo slowing - stay controlled",
            RepTip::ConsistencyDrifting => "Consistency drifting (ML)",
        }
    }
}
