use std::collections::BTreeMap;
use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::landmarks::Side;

/// Coaching issue categories tracked over a session.
///
/// Declaration order doubles as the tie-break order when ranking issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ElbowDriftRight,
    ElbowDriftLeft,
    SideLean,
    ForwardLean,
    ArmAsymmetry,
    ElbowBendRight,
    ElbowBendLeft,
    TrackingLow,
    StalledRep,
}

impl IssueKind {
    pub fn elbow_drift(side: Side) -> Self {
        match side {
            Side::Left => IssueKind::ElbowDriftLeft,
            Side::Right => IssueKind::ElbowDriftRight,
        }
    }

    pub fn elbow_bend(side: Side) -> Self {
        match side {
            Side::Left => IssueKind::ElbowBendLeft,
            Side::Right => IssueKind::ElbowBendRight,
        }
    }
}

impl Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IssueKind::ElbowDriftRight => "right elbow drift",
            IssueKind::ElbowDriftLeft => "left elbow drift",
            IssueKind::SideLean => "side lean/swing",
            IssueKind::ForwardLean => "forward/back lean",
            IssueKind::ArmAsymmetry => "arm asymmetry",
            IssueKind::ElbowBendRight => "right elbow bend",
            IssueKind::ElbowBendLeft => "left elbow bend",
            IssueKind::TrackingLow => "tracking low",
            IssueKind::StalledRep => "stalled rep",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueLevel {
    Warn,
    Bad,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCount {
    pub warn: usize,
    pub bad: usize,
}

impl IssueCount {
    pub fn total(&self) -> usize {
        self.warn + self.bad
    }
}

/// Frame-level occurrence counts per issue category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueCounters {
    counts: BTreeMap<IssueKind, IssueCount>,
}

impl IssueCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: IssueKind, level: IssueLevel) {
        let entry = self.counts.entry(kind).or_default();
        match level {
            IssueLevel::Warn => entry.warn += 1,
            IssueLevel::Bad => entry.bad += 1,
        }
    }

    pub fn get(&self, kind: IssueKind) -> IssueCount {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn counts(&self) -> &BTreeMap<IssueKind, IssueCount> {
        &self.counts
    }

    /// The `n` most frequent categories, most frequent first. Ties keep
    /// category order.
    pub fn top(&self, n: usize) -> Vec<(IssueKind, usize)> {
        self.counts
            .iter()
            .map(|(kind, count)| (*kind, count.total()))
            .filter(|(_, total)| *total > 0)
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .take(n)
            .collect()
    }

    /// Human readable top issues, e.g. `right elbow drift x12, tracking low x3`.
    pub fn top_text(&self, n: usize) -> Option<String> {
        let top = self.top(n);
        if top.is_empty() {
            return None;
        }
        Some(
            top.iter()
                .map(|(kind, total)| format!("{kind} x{total}"))
                .join(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_counters() {
        let counters = IssueCounters::new();
        assert!(counters.top(2).is_empty());
        assert_eq!(counters.top_text(2), None);
    }

    #[test]
    fn test_top_issues_ranked_by_frequency() {
        let mut counters = IssueCounters::new();
        for _ in 0..3 {
            counters.record(IssueKind::SideLean, IssueLevel::Warn);
        }
        for _ in 0..5 {
            counters.record(IssueKind::ElbowDriftLeft, IssueLevel::Bad);
        }
        counters.record(IssueKind::TrackingLow, IssueLevel::Warn);

        let top = counters.top(2);
        assert_eq!(
            top,
            vec![(IssueKind::ElbowDriftLeft, 5), (IssueKind::SideLean, 3)]
        );
        assert_eq!(
            counters.top_text(2).as_deref(),
            Some("left elbow drift x5, side lean/swing x3")
        );
    }

    #[test]
    fn test_ties_keep_category_order() {
        let mut counters = IssueCounters::new();
        counters.record(IssueKind::StalledRep, IssueLevel::Warn);
        counters.record(IssueKind::ElbowDriftRight, IssueLevel::Warn);
        let top = counters.top(2);
        assert_eq!(top[0].0, IssueKind::ElbowDriftRight);
        assert_eq!(top[1].0, IssueKind::StalledRep);
    }

    #[test]
    fn test_warn_and_bad_are_tracked_separately() {
        let mut counters = IssueCounters::new();
        counters.record(IssueKind::ArmAsymmetry, IssueLevel::Warn);
        counters.record(IssueKind::ArmAsymmetry, IssueLevel::Bad);
        counters.record(IssueKind::ArmAsymmetry, IssueLevel::Bad);
        let count = counters.get(IssueKind::ArmAsymmetry);
        assert_eq!(count.warn, 1);
        assert_eq!(count.bad, 2);
        assert_eq!(count.total(), 3);
    }

    #[test]
    fn test_counters_serialize_with_named_keys() {
        let mut counters = IssueCounters::new();
        counters.record(IssueKind::ForwardLean, IssueLevel::Warn);
        let json = serde_json::to_string(&counters).unwrap();
        assert!(json.contains("forward_lean"));
    }
}
