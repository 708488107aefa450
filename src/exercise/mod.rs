pub mod bicep_curl;
pub mod lateral_raise;
pub mod shoulder_press;

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    LiftRightError,
    landmarks::{BodyMetrics, Joint, Side},
    scoring::FeatureMap,
    segmentation::{FrameIssues, RepSummary},
    session::{
        feedback::Severity,
        issues::{IssueCounters, IssueLevel},
    },
};

pub use bicep_curl::BicepCurl;
pub use lateral_raise::LateralRaise;
pub use shoulder_press::ShoulderPress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exercise {
    BicepCurl,
    LateralRaise,
    ShoulderPress,
}

impl Exercise {
    pub const ALL: [Exercise; 3] = [
        Exercise::BicepCurl,
        Exercise::LateralRaise,
        Exercise::ShoulderPress,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Exercise::BicepCurl => "bicep_curl",
            Exercise::LateralRaise => "lateral_raise",
            Exercise::ShoulderPress => "shoulder_press",
        }
    }
}

impl Display for Exercise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Exercise {
    type Err = LiftRightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Exercise::ALL
            .into_iter()
            .find(|e| e.name() == normalized)
            .ok_or(LiftRightError::UnsupportedExercise {
                name: s.to_string(),
            })
    }
}

/// Signal channels for one side of the body on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideSignal {
    pub signal: f64,
    pub drift: f64,
    pub aux: Option<f64>,
}

/// Outcome of the per-frame form rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAssessment {
    /// Issues to latch onto the rep in progress
    pub issues: FrameIssues,
    pub text: String,
    pub severity: Severity,
}

impl FrameAssessment {
    /// Standard wording: the first unsafe issue, else the first tip.
    pub fn from_issues(issues: FrameIssues) -> Self {
        let (text, severity) = describe(&issues);
        Self {
            issues,
            text,
            severity,
        }
    }
}

pub(crate) fn describe(issues: &FrameIssues) -> (String, Severity) {
    if let Some(bad) = issues.bad.first() {
        (format!("UNSAFE: {bad}"), Severity::Danger)
    } else if let Some(tip) = issues.tips.first() {
        (format!("COACHING: {tip}"), Severity::Warning)
    } else {
        ("STATUS: Stable".to_string(), Severity::Info)
    }
}

/// Baseline-relative per-rep coaching tips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepTip {
    FatigueTrend,
    RangeDropping,
    RangeTooSmall,
    TempoSlowing,
    CompensationGrowing,
    ConsistencyDrifting,
}

/// Per-exercise strategy plugged into the generic session engine.
pub trait ExerciseProfile: Send {
    fn exercise(&self) -> Exercise;

    /// Joints whose visibility makes up the frame's tracking confidence.
    fn confidence_joints(&self) -> &'static [Joint];

    fn side_signal(&self, body: &BodyMetrics, side: Side) -> SideSignal;

    /// Apply the frame-level form rules, recording issue occurrences.
    fn assess_frame(&mut self, body: &BodyMetrics, counters: &mut IssueCounters)
    -> FrameAssessment;

    /// Names of every feature `rep_features` produces.
    fn feature_names(&self) -> &'static [&'static str];

    fn rep_features(&self, rep: &RepSummary) -> FeatureMap;

    /// Compensation measure for fatigue, larger meaning worse form. Computed
    /// from clipped features.
    fn compensation(&self, features: &FeatureMap) -> f64;

    fn general_tips(&self) -> &'static [&'static str];

    fn tip_text(&self, tip: RepTip) -> &'static str {
        match tip {
            RepTip::FatigueTrend => "Fatigue trend - consider rest or lighter weight",
            RepTip::RangeDropping => "Range dropping - lighten weight or rest",
            RepTip::RangeTooSmall => "Try a fuller range of motion (if comfortable)",
            RepTip::TempoSlowing => "Tempo slowing - stay controlled",
            RepTip::CompensationGrowing => "Form compensation increasing",
            RepTip::ConsistencyDrifting => "Consistency drifting (ML)",
        }
    }
}

pub fn profile_for(exercise: Exercise) -> Box<dyn ExerciseProfile> {
    match exercise {
        Exercise::BicepCurl => Box::new(BicepCurl::new()),
        Exercise::LateralRaise => Box::new(LateralRaise::new()),
        Exercise::ShoulderPress => Box::new(ShoulderPress::new()),
    }
}

/// Counts consecutive frames beyond a warn and a bad threshold so one noisy
/// frame does not raise an issue.
#[derive(Debug, Clone)]
pub(crate) struct StreakRule {
    warn: f64,
    bad: f64,
    /// Thresholds are upper bounds when false
    below: bool,
    warn_streak: usize,
    bad_streak: usize,
}

pub(crate) const WARN_STREAK: usize = 6;
pub(crate) const BAD_STREAK: usize = 4;

impl StreakRule {
    pub(crate) fn above(warn: f64, bad: f64) -> Self {
        Self {
            warn,
            bad,
            below: false,
            warn_streak: 0,
            bad_streak: 0,
        }
    }

    pub(crate) fn below(warn: f64, bad: f64) -> Self {
        Self {
            below: true,
            ..Self::above(warn, bad)
        }
    }

    fn beyond(&self, value: f64, threshold: f64) -> bool {
        if self.below {
            value < threshold
        } else {
            value > threshold
        }
    }

    pub(crate) fn update(&mut self, value: f64) -> Option<IssueLevel> {
        self.bad_streak = if self.beyond(value, self.bad) {
            self.bad_streak + 1
        } else {
            0
        };
        self.warn_streak = if self.beyond(value, self.warn) {
            self.warn_streak + 1
        } else {
            0
        };

        if self.bad_streak >= BAD_STREAK {
            Some(IssueLevel::Bad)
        } else if self.warn_streak >= WARN_STREAK {
            Some(IssueLevel::Warn)
        } else {
            None
        }
    }
}
