use crate::{
    landmarks::{BodyMetrics, Joint, Side},
    scoring::FeatureMap,
    segmentation::{FrameIssues, RepSummary},
    session::issues::{IssueCounters, IssueKind, IssueLevel},
};

use super::{Exercise, ExerciseProfile, FrameAssessment, RepTip, SideSignal};

const ELBOW_DRIFT_WARN: f64 = 0.35;
const ELBOW_DRIFT_BAD: f64 = 0.55;

const FEATURES: [&str; 4] = ["rom", "duration", "trunk_absmax", "elbow_drift_absmax"];

const GENERAL_TIPS: [&str; 5] = [
    "Control the way down (slow eccentric).",
    "Keep wrists neutral.",
    "Relax the shoulders.",
    "Breathe out as you curl.",
    "Keep your upper arm steady.",
];

/// Elbow-angle driven curl. Form is judged on how far each elbow drifts away
/// from the torso.
pub struct BicepCurl;

impl BicepCurl {
    pub fn new() -> Self {
        Self
    }

    fn drift_level(drift: f64) -> Option<IssueLevel> {
        if drift > ELBOW_DRIFT_BAD {
            Some(IssueLevel::Bad)
        } else if drift > ELBOW_DRIFT_WARN {
            Some(IssueLevel::Warn)
        } else {
            None
        }
    }
}

impl Default for BicepCurl {
    fn default() -> Self {
        Self::new()
    }
}

fn which(right: bool, left: bool) -> &'static str {
    match (right, left) {
        (true, true) => "both",
        (true, false) => "right",
        _ => "left",
    }
}

impl ExerciseProfile for BicepCurl {
    fn exercise(&self) -> Exercise {
        Exercise::BicepCurl
    }

    fn confidence_joints(&self) -> &'static [Joint] {
        &Joint::REQUIRED
    }

    fn side_signal(&self, body: &BodyMetrics, side: Side) -> SideSignal {
        let arm = body.side(side);
        SideSignal {
            signal: arm.elbow_angle,
            drift: arm.elbow_drift,
            aux: Some(body.trunk_offset.abs()),
        }
    }

    fn assess_frame(
        &mut self,
        body: &BodyMetrics,
        counters: &mut IssueCounters,
    ) -> FrameAssessment {
        let right = Self::drift_level(body.right.elbow_drift);
        let left = Self::drift_level(body.left.elbow_drift);
        for (side, level) in [(Side::Right, right), (Side::Left, left)] {
            if let Some(level) = level {
                counters.record(IssueKind::elbow_drift(side), level);
            }
        }

        let mut issues = FrameIssues::default();
        if right == Some(IssueLevel::Bad) || left == Some(IssueLevel::Bad) {
            let side = which(right == Some(IssueLevel::Bad), left == Some(IssueLevel::Bad));
            issues.bad.push(format!("Elbow drifting a lot ({side})"));
        } else if right.is_some() || left.is_some() {
            let side = which(right.is_some(), left.is_some());
            let noun = if side == "both" { "elbows" } else { "elbow" };
            issues.tips.push(format!("Keep {noun} steadier ({side})"));
        }
        FrameAssessment::from_issues(issues)
    }

    fn feature_names(&self) -> &'static [&'static str] {
        &FEATURES
    }

    fn rep_features(&self, rep: &RepSummary) -> FeatureMap {
        FeatureMap::from([
            ("rom", rep.range),
            ("duration", rep.duration_s),
            ("trunk_absmax", rep.aux_max.unwrap_or(0.0)),
            ("elbow_drift_absmax", rep.peak_drift),
        ])
    }

    fn compensation(&self, features: &FeatureMap) -> f64 {
        features.get("elbow_drift_absmax").copied().unwrap_or(0.0)
    }

    fn general_tips(&self) -> &'static [&'static str] {
        &GENERAL_TIPS
    }

    fn tip_text(&self, tip: RepTip) -> &'static str {
        match tip {
            RepTip::RangeDropping => "ROM is dropping - lighten weight or rest",
            RepTip::CompensationGrowing => "Elbows drifting more - pin the upper arm",
            RepTip::FatigueTrend => "Fatigue trend - consider rest or lighter weight",
            RepTip::RangeTooSmall => "Try a fuller range of motion (if comfortable)",
            RepTip::TempoSlowing => "Tempo slowing - stay controlled",
            RepTip::ConsistencyDrifting => "Consistency drifting (ML)",
        }
    }
}
