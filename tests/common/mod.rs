// Synthetic landmark streams shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::f64::consts::PI;

use liftright::scoring::{ModelBundle, OneClassSvm, RobustScaler};
use liftright::{Joint, Landmark, LandmarkFrame};

pub const FPS: f64 = 30.0;
pub const CURL_FEATURES: [&str; 4] = ["rom", "duration", "trunk_absmax", "elbow_drift_absmax"];

/// Upright pose with the right elbow bent to `angle` degrees.
pub fn curl_pose(angle: f64) -> HashMap<Joint, Landmark> {
    let shoulder = Landmark::new(0.40, 0.30, 1.0);
    let elbow = Landmark::new(0.39, 0.45, 1.0);
    let (ux, uy) = (shoulder.x - elbow.x, shoulder.y - elbow.y);
    let norm = ux.hypot(uy);
    let (sin, cos) = angle.to_radians().sin_cos();
    let wrist = Landmark::new(
        elbow.x + 0.15 * (ux * cos - uy * sin) / norm,
        elbow.y + 0.15 * (ux * sin + uy * cos) / norm,
        1.0,
    );

    HashMap::from([
        (Joint::LeftShoulder, Landmark::new(0.60, 0.30, 1.0)),
        (Joint::RightShoulder, shoulder),
        (Joint::LeftElbow, Landmark::new(0.61, 0.45, 1.0)),
        (Joint::RightElbow, elbow),
        (Joint::LeftWrist, Landmark::new(0.61, 0.60, 1.0)),
        (Joint::RightWrist, wrist),
        (Joint::LeftHip, Landmark::new(0.58, 0.70, 1.0)),
        (Joint::RightHip, Landmark::new(0.42, 0.70, 1.0)),
    ])
}

/// Elbow angle swinging between 165 and 55 degrees, starting at rest.
pub fn curl_angle(t: f64, period_s: f64) -> f64 {
    110.0 + 55.0 * (2.0 * PI * t / period_s).cos()
}

/// `reps` curls of `period_s` each, sampled at [`FPS`], starting at `t0`.
pub fn curl_frames(reps: usize, period_s: f64, t0: f64) -> Vec<LandmarkFrame> {
    let frames = (reps as f64 * period_s * FPS).round() as usize;
    (0..frames)
        .map(|i| {
            let t = i as f64 / FPS;
            LandmarkFrame::with_landmarks(t0 + t, curl_pose(curl_angle(t, period_s)))
        })
        .collect()
}

/// Model that scores every rep the same, well above its threshold.
pub fn accepting_model(features: &[&str]) -> ModelBundle {
    ModelBundle {
        exercise: None,
        features: features.iter().map(|f| f.to_string()).collect(),
        threshold: 0.0,
        scaler: RobustScaler {
            center: vec![0.0; features.len()],
            scale: vec![1.0; features.len()],
        },
        model: OneClassSvm {
            gamma: 1e-12,
            support_vectors: vec![vec![0.0; features.len()]],
            dual_coef: vec![1.0],
            intercept: -0.5,
        },
    }
}

/// Arms hanging still for `secs` seconds.
pub fn rest_frames(t0: f64, secs: f64) -> Vec<LandmarkFrame> {
    let frames = (secs * FPS).round() as usize;
    (0..frames)
        .map(|i| LandmarkFrame::with_landmarks(t0 + i as f64 / FPS, curl_pose(165.0)))
        .collect()
}
