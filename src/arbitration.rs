use std::collections::VecDeque;

use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

use crate::landmarks::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedJoint {
    Elbow,
    Wrist,
}

/// How the engine decides which arm drives segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArbitrationPolicy {
    /// Better-tracked joint wins, right side on ties.
    Confidence { joint: TrackedJoint },
    /// Side with the larger recent signal range wins. Within `tie_margin` the
    /// side with the smaller peak drift wins.
    Amplitude { window: usize, tie_margin: f64 },
}

/// Per-side view of a frame offered to the arbiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideCandidate {
    pub signal: f64,
    pub drift: f64,
    pub elbow_visibility: f64,
    pub wrist_visibility: f64,
}

impl SideCandidate {
    fn visibility(&self, joint: TrackedJoint) -> f64 {
        match joint {
            TrackedJoint::Elbow => self.elbow_visibility,
            TrackedJoint::Wrist => self.wrist_visibility,
        }
    }
}

#[derive(Debug, Default)]
struct SideWindow {
    signals: VecDeque<f64>,
    drifts: VecDeque<f64>,
}

impl SideWindow {
    fn push(&mut self, candidate: &SideCandidate, capacity: usize) {
        if !candidate.signal.is_finite() {
            return;
        }
        if self.signals.len() == capacity {
            self.signals.pop_front();
            self.drifts.pop_front();
        }
        self.signals.push_back(candidate.signal);
        self.drifts.push_back(candidate.drift.abs());
    }

    fn range(&self) -> f64 {
        match self.signals.iter().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::MinMax(lo, hi) => hi - lo,
            MinMaxResult::OneElement(_) | MinMaxResult::NoElements => 0.0,
        }
    }

    fn peak_drift(&self) -> f64 {
        self.drifts.iter().copied().fold(0.0, f64::max)
    }
}

/// Picks the tracked side each frame and holds it for the duration of a rep.
pub struct SideArbiter {
    policy: ArbitrationPolicy,
    locked: Option<Side>,
    left: SideWindow,
    right: SideWindow,
}

impl SideArbiter {
    pub fn new(policy: ArbitrationPolicy) -> Self {
        Self {
            policy,
            locked: None,
            left: SideWindow::default(),
            right: SideWindow::default(),
        }
    }

    pub fn policy(&self) -> ArbitrationPolicy {
        self.policy
    }

    pub fn locked(&self) -> Option<Side> {
        self.locked
    }

    pub fn lock(&mut self, side: Side) {
        self.locked = Some(side);
    }

    pub fn unlock(&mut self) {
        self.locked = None;
    }

    /// Record this frame's candidates and return the side to track. A locked
    /// side always wins.
    pub fn choose(&mut self, left: &SideCandidate, right: &SideCandidate) -> Side {
        let preferred = match self.policy {
            ArbitrationPolicy::Confidence { joint } => {
                if right.visibility(joint) >= left.visibility(joint) {
                    Side::Right
                } else {
                    Side::Left
                }
            }
            ArbitrationPolicy::Amplitude { window, tie_margin } => {
                let capacity = window.max(1);
                self.left.push(left, capacity);
                self.right.push(right, capacity);
                let (range_l, range_r) = (self.left.range(), self.right.range());
                if range_r > range_l + tie_margin {
                    Side::Right
                } else if range_l > range_r + tie_margin {
                    Side::Left
                } else if self.right.peak_drift() <= self.left.peak_drift() {
                    Side::Right
                } else {
                    Side::Left
                }
            }
        };
        self.locked.unwrap_or(preferred)
    }
}
