use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::landmarks::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Good,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Posture,
    Fatigue,
}

/// Feedback logged against the session and returned in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub feedback_type: FeedbackType,
    pub severity: Severity,
    pub feedback_text: String,
    pub rep: usize,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormLabel {
    Good,
    Warning,
    Bad,
}

impl FormLabel {
    pub fn severity(&self) -> Severity {
        match self {
            FormLabel::Good => Severity::Good,
            FormLabel::Warning => Severity::Warning,
            FormLabel::Bad => Severity::Danger,
        }
    }
}

impl Display for FormLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormLabel::Good => write!(f, "good"),
            FormLabel::Warning => write!(f, "warning"),
            FormLabel::Bad => write!(f, "bad"),
        }
    }
}

/// Outward record of one counted rep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepRecord {
    pub rep_index: usize,
    pub duration_ms: u64,
    pub range: f64,
    pub peak_drift: f64,
    pub confidence_avg: f64,
    pub form_label: FormLabel,
    pub anomaly_score: f64,
    pub fatigue_index: f64,
    pub side: Side,
    pub tip_seen: bool,
    pub bad_seen: bool,
    pub ml_drift: bool,
    pub reasons: Vec<String>,
}

pub const MAX_REASONS: usize = 4;

pub const PRAISE_LINES: [&str; 5] = [
    "Clean rep - controlled.",
    "Solid rep - keep it steady.",
    "Nice rep - good control.",
    "Smooth rep.",
    "Good rep - consistent tempo.",
];

/// Praise for a clean rep. Lines rotate with the rep index, and every other
/// rep gets one of the exercise's general tips appended.
pub fn praise(rep_index: usize, general_tips: &[&str]) -> String {
    let line = PRAISE_LINES[rep_index.saturating_sub(1) % PRAISE_LINES.len()];
    if general_tips.is_empty() || rep_index % 2 == 1 {
        return line.to_string();
    }
    let tip = general_tips[(rep_index / 2).saturating_sub(1) % general_tips.len()];
    format!("{line} {tip}")
}
