use std::collections::HashMap;

use super::{Joint, Landmark, Side};

const EPS: f64 = 1e-6;

/// Derived measurements for one arm.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideMetrics {
    /// Shoulder-elbow-wrist angle in degrees
    pub elbow_angle: f64,
    /// Horizontal elbow distance from the shoulder, in shoulder widths
    pub elbow_drift: f64,
    /// Wrist height above the shoulder, in shoulder widths (positive = above)
    pub wrist_rel_y: f64,
    /// Horizontal wrist distance from the shoulder, in shoulder widths
    pub wrist_drift: f64,
    pub elbow_visibility: f64,
    pub wrist_visibility: f64,
}

/// Per-frame metrics for the whole upper body.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyMetrics {
    pub timestamp_s: f64,
    /// Mean visibility over the exercise's confidence joints
    pub confidence: f64,
    pub shoulder_width: f64,
    /// Lateral shoulder-midpoint offset from the hip midpoint, in shoulder widths
    pub trunk_offset: f64,
    /// Vertical shoulder-to-hip distance, in shoulder widths
    pub torso_height: f64,
    pub left: SideMetrics,
    pub right: SideMetrics,
}

impl BodyMetrics {
    pub fn side(&self, side: Side) -> &SideMetrics {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Height difference between the two wrists, in shoulder widths.
    pub fn wrist_asymmetry(&self) -> f64 {
        (self.right.wrist_rel_y - self.left.wrist_rel_y).abs()
    }
}

pub(crate) fn safe_div(a: f64, b: f64) -> f64 {
    a / (b + EPS)
}

/// Angle at `b` formed by the segments `b->a` and `b->c`, in degrees.
pub fn joint_angle(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let ba = (a.0 - b.0, a.1 - b.1);
    let bc = (c.0 - b.0, c.1 - b.1);
    let denom = ba.0.hypot(ba.1) * bc.0.hypot(bc.1) + EPS;
    let cos_angle = ((ba.0 * bc.0 + ba.1 * bc.1) / denom).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

fn side_metrics(
    joints: &HashMap<Joint, Landmark>,
    side: Side,
    shoulder_width: f64,
) -> Option<SideMetrics> {
    let shoulder = joints.get(&Joint::shoulder(side))?;
    let elbow = joints.get(&Joint::elbow(side))?;
    let wrist = joints.get(&Joint::wrist(side))?;

    Some(SideMetrics {
        elbow_angle: joint_angle(shoulder.xy(), elbow.xy(), wrist.xy()),
        elbow_drift: safe_div((elbow.x - shoulder.x).abs(), shoulder_width),
        wrist_rel_y: safe_div(shoulder.y - wrist.y, shoulder_width),
        wrist_drift: safe_div((wrist.x - shoulder.x).abs(), shoulder_width),
        elbow_visibility: elbow.visibility,
        wrist_visibility: wrist.visibility,
    })
}

/// Compute body metrics for a frame, or `None` when a required joint is
/// missing.
///
/// `confidence_joints` selects which joints contribute to the frame's
/// tracking confidence; `min_shoulder_width` floors the normalizing width so a
/// side-on camera angle cannot blow up the ratios.
pub fn extract_body_metrics(
    timestamp_s: f64,
    joints: &HashMap<Joint, Landmark>,
    confidence_joints: &[Joint],
    min_shoulder_width: f64,
) -> Option<BodyMetrics> {
    if Joint::REQUIRED.iter().any(|j| !joints.contains_key(j)) {
        return None;
    }

    let lsh = joints.get(&Joint::LeftShoulder)?;
    let rsh = joints.get(&Joint::RightShoulder)?;
    let lhp = joints.get(&Joint::LeftHip)?;
    let rhp = joints.get(&Joint::RightHip)?;

    let confidence = if confidence_joints.is_empty() {
        0.0
    } else {
        confidence_joints
            .iter()
            .filter_map(|j| joints.get(j))
            .map(|l| l.visibility)
            .sum::<f64>()
            / confidence_joints.len() as f64
    };

    let shoulder_width = (lsh.x - rsh.x).abs().max(min_shoulder_width);
    let mid_shoulder = ((lsh.x + rsh.x) / 2.0, (lsh.y + rsh.y) / 2.0);
    let mid_hip = ((lhp.x + rhp.x) / 2.0, (lhp.y + rhp.y) / 2.0);

    Some(BodyMetrics {
        timestamp_s,
        confidence,
        shoulder_width,
        trunk_offset: safe_div(mid_shoulder.0 - mid_hip.0, shoulder_width),
        torso_height: (mid_shoulder.1 - mid_hip.1).abs() / shoulder_width,
        left: side_metrics(joints, Side::Left, shoulder_width)?,
        right: side_metrics(joints, Side::Right, shoulder_width)?,
    })
}
