use crate::{
    landmarks::{BodyMetrics, Joint, Side},
    scoring::FeatureMap,
    segmentation::{FrameIssues, RepSummary},
    session::issues::{IssueCounters, IssueKind, IssueLevel},
};

use super::{Exercise, ExerciseProfile, FrameAssessment, RepTip, SideSignal};

const TRUNK_LEAN: f64 = 0.12;
const ARM_ASYMMETRY: f64 = 0.25;

const CONFIDENCE_JOINTS: [Joint; 6] = [
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftWrist,
    Joint::RightWrist,
    Joint::LeftHip,
    Joint::RightHip,
];

const FEATURES: [&str; 5] = [
    "wrist_rel_range",
    "duration",
    "trunk_absmax",
    "wrist_drift_absmax",
    "max_wrist_rel_y",
];

const GENERAL_TIPS: [&str; 4] = [
    "Brace your core before pressing.",
    "Keep ribs down, avoid arching.",
    "Stack wrists over elbows.",
    "Lower the weight under control.",
];

/// Overhead press tracked by wrist height. One posture problem on a frame is a
/// tip, two at once is unsafe.
pub struct ShoulderPress;

impl ShoulderPress {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShoulderPress {
    fn default() -> Self {
        Self::new()
    }
}

impl ExerciseProfile for ShoulderPress {
    fn exercise(&self) -> Exercise {
        Exercise::ShoulderPress
    }

    fn confidence_joints(&self) -> &'static [Joint] {
        &CONFIDENCE_JOINTS
    }

    fn side_signal(&self, body: &BodyMetrics, side: Side) -> SideSignal {
        let arm = body.side(side);
        SideSignal {
            signal: arm.wrist_rel_y,
            drift: arm.wrist_drift,
            aux: Some(body.trunk_offset.abs()),
        }
    }

    fn assess_frame(
        &mut self,
        body: &BodyMetrics,
        counters: &mut IssueCounters,
    ) -> FrameAssessment {
        let mut problems = Vec::new();
        if body.trunk_offset.abs() > TRUNK_LEAN {
            problems.push((IssueKind::SideLean, "Avoid leaning / back arch"));
        }
        if body.wrist_asymmetry() > ARM_ASYMMETRY {
            problems.push((IssueKind::ArmAsymmetry, "Keep arms even"));
        }

        let level = if problems.len() > 1 {
            IssueLevel::Bad
        } else {
            IssueLevel::Warn
        };
        for (kind, _) in &problems {
            counters.record(*kind, level);
        }

        let mut issues = FrameIssues::default();
        match problems.as_slice() {
            [] => {}
            [(_, only)] => issues.tips.push(only.to_string()),
            [(_, first), (_, second), ..] => issues.bad.push(format!("{first} + {second}")),
        }
        FrameAssessment::from_issues(issues)
    }

    fn feature_names(&self) -> &'static [&'static str] {
        &FEATURES
    }

    fn rep_features(&self, rep: &RepSummary) -> FeatureMap {
        FeatureMap::from([
            ("wrist_rel_range", rep.range),
            ("duration", rep.duration_s),
            ("trunk_absmax", rep.aux_max.unwrap_or(0.0)),
            ("wrist_drift_absmax", rep.peak_drift),
            ("max_wrist_rel_y", rep.max),
        ])
    }

    fn compensation(&self, features: &FeatureMap) -> f64 {
        features.get("wrist_drift_absmax").copied().unwrap_or(0.0)
    }

    fn general_tips(&self) -> &'static [&'static str] {
        &GENERAL_TIPS
    }

    fn tip_text(&self, tip: RepTip) -> &'static str {
        match tip {
            RepTip::CompensationGrowing => "Wrists flaring out - stack them over the elbows",
            RepTip::RangeTooSmall => "Press all the way up (if comfortable)",
            RepTip::FatigueTrend => "Fatigue trend - consider rest or lighter weight",
            RepTip::RangeDropping => "Range dropping - lighten weight or rest",
            RepTip::TempoSlowing => "Tempo slowing - stay controlled",
            RepTip::ConsistencyDrifting => "Consistency drifting (ML)",
        }
    }
}
