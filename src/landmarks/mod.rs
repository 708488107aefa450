pub mod metrics;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use metrics::{BodyMetrics, SideMetrics, extract_body_metrics, joint_angle};

/// Body side of a tracked limb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Skeleton joints consumed by the engine.
///
/// The landmark provider may report more joints; anything else in the frame is
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
}

impl Joint {
    /// Joints every frame must carry for metrics to be computed.
    pub const REQUIRED: [Joint; 8] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
    ];

    pub fn shoulder(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftShoulder,
            Side::Right => Joint::RightShoulder,
        }
    }

    pub fn elbow(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftElbow,
            Side::Right => Joint::RightElbow,
        }
    }

    pub fn wrist(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftWrist,
            Side::Right => Joint::RightWrist,
        }
    }

    pub fn hip(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftHip,
            Side::Right => Joint::RightHip,
        }
    }
}

/// Single landmark as reported by the pose estimator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Visibility confidence, 0.0 to 1.0
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// One frame from the landmark provider.
///
/// `landmarks` is `None` when the provider found no pose in the frame.
/// Coordinates may be pixels or normalized, but must be consistent within a
/// session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Monotonic capture time in seconds
    pub timestamp_s: f64,
    #[serde(default)]
    pub landmarks: Option<HashMap<Joint, Landmark>>,
}

impl LandmarkFrame {
    pub fn empty(timestamp_s: f64) -> Self {
        Self {
            timestamp_s,
            landmarks: None,
        }
    }

    pub fn with_landmarks(timestamp_s: f64, landmarks: HashMap<Joint, Landmark>) -> Self {
        Self {
            timestamp_s,
            landmarks: Some(landmarks),
        }
    }
}
