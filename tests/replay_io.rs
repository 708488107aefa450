// File-based inputs and outputs: landmark JSON lines, model bundles, config and rep logs

mod common;

use std::sync::{Arc, mpsc};
use std::thread;

use common::{CURL_FEATURES, accepting_model, curl_frames, rest_frames};
use liftright::scoring::ModelBundle;
use liftright::session::feedback::RepRecord;
use liftright::session::issues::IssueKind;
use liftright::writer::{write_rep_log, write_summary};
use liftright::{
    EngineConfig, Exercise, LandmarkFrame, LiftRightError, SessionIdentity, SessionRegistry,
};
use tempfile::tempdir;

#[test]
fn test_replay_from_json_lines() {
    let dir = tempdir().unwrap();
    let frames_path = dir.path().join("frames.jsonl");
    let model_path = dir.path().join("model.json");
    let rep_log_path = dir.path().join("reps.jsonl");
    let summary_path = dir.path().join("summary.json");

    let mut frames = curl_frames(3, 2.0, 0.0);
    // a dropped pose in the middle of the set
    frames.insert(40, LandmarkFrame::empty(40.5 / 30.0));
    frames.extend(rest_frames(6.0, 0.5));
    serde_jsonlines::write_json_lines(&frames_path, &frames).unwrap();
    std::fs::write(
        &model_path,
        serde_json::to_string(&accepting_model(&CURL_FEATURES)).unwrap(),
    )
    .unwrap();

    let registry = SessionRegistry::new(EngineConfig::default());
    let model = ModelBundle::from_file(&model_path).unwrap();
    registry.register_model(Exercise::BicepCurl, Arc::new(model));
    let token = registry
        .start(Exercise::BicepCurl, SessionIdentity::default())
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let log_path = rep_log_path.clone();
    let writer = thread::spawn(move || write_rep_log(&log_path, rx));
    for frame in serde_jsonlines::json_lines::<LandmarkFrame, _>(&frames_path).unwrap() {
        let update = registry.update(token, &frame.unwrap()).unwrap();
        tx.send(update).unwrap();
    }
    drop(tx);
    assert_eq!(writer.join().unwrap().unwrap(), 3);

    let summary = registry.finish(token).unwrap();
    assert_eq!(summary.reps_total, 3);
    assert_eq!(summary.top_issues, vec![(IssueKind::TrackingLow, 1)]);
    write_summary(&summary_path, &summary).unwrap();

    let logged = serde_jsonlines::json_lines::<RepRecord, _>(&rep_log_path)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(logged, summary.reps);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(written["reps_total"], 3);
    assert_eq!(written["issue_counts"]["tracking_low"]["warn"], 1);
}

#[test]
fn test_malformed_bundle_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.json");
    let mut bundle = accepting_model(&CURL_FEATURES);
    bundle.scaler.scale.pop();
    std::fs::write(&path, serde_json::to_string(&bundle).unwrap()).unwrap();
    assert!(matches!(
        ModelBundle::from_file(&path),
        Err(LiftRightError::ModelShapeMismatch { .. })
    ));

    std::fs::write(&path, "{ \"features\": [").unwrap();
    assert!(matches!(
        ModelBundle::from_file(&path),
        Err(LiftRightError::ModelParseError { .. })
    ));
    assert!(matches!(
        ModelBundle::from_file(&dir.path().join("missing.json")),
        Err(LiftRightError::ModelLoadError { .. })
    ));
}

#[test]
fn test_config_file_changes_session_tuning() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let mut config = EngineConfig::default();
    config.recent_reps_exposed = 1;
    config.save_to(&path).unwrap();

    let registry = SessionRegistry::new(EngineConfig::from_path(&path).unwrap());
    registry.register_model(
        Exercise::BicepCurl,
        Arc::new(accepting_model(&CURL_FEATURES)),
    );
    let token = registry
        .start(Exercise::BicepCurl, SessionIdentity::default())
        .unwrap();
    let mut frames = curl_frames(2, 2.0, 0.0);
    frames.extend(rest_frames(4.0, 0.5));
    let mut last = None;
    for frame in &frames {
        last = Some(registry.update(token, frame).unwrap());
    }
    let last = last.unwrap();
    assert_eq!(last.rep_count, 2);
    assert_eq!(last.recent_reps.len(), 1);
    assert_eq!(last.recent_reps[0].rep_index, 2);
}
