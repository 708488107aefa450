use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::Receiver,
};

use log::{error, info};

use crate::{
    LiftRightError,
    session::{FrameUpdate, SessionSummary},
};

/// Append one JSON line per completed rep until the sender hangs up. Returns
/// the number of reps written.
pub fn write_rep_log(
    file: &Path,
    update_receiver: Receiver<FrameUpdate>,
) -> Result<usize, LiftRightError> {
    let rep_file = File::create(file).map_err(|e| LiftRightError::WriterError { source: e })?;
    let mut rep_file_writer = BufWriter::new(rep_file);
    let mut written = 0;
    for update in &update_receiver {
        let Some(rep) = update.latest_rep.as_ref() else {
            continue;
        };
        let line = match serde_json::to_string(rep) {
            Ok(line) => line,
            Err(e) => {
                error!("Could not serialize rep {}: {e}", rep.rep_index);
                continue;
            }
        };
        match writeln!(rep_file_writer, "{line}") {
            Ok(()) => written += 1,
            Err(e) => error!("Error while writing rep {} to output file: {e}", rep.rep_index),
        }
    }
    rep_file_writer
        .flush()
        .map_err(|e| LiftRightError::WriterError { source: e })?;
    info!("Wrote {written} reps to {}", file.display());
    Ok(written)
}

pub fn write_summary(file: &Path, summary: &SessionSummary) -> Result<(), LiftRightError> {
    let summary_file =
        File::create(file).map_err(|e| LiftRightError::WriterError { source: e })?;
    let mut summary_writer = BufWriter::new(summary_file);
    serde_json::to_writer_pretty(&mut summary_writer, summary)
        .map_err(|e| LiftRightError::WriterError { source: e.into() })?;
    summary_writer
        .flush()
        .map_err(|e| LiftRightError::WriterError { source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    use tempfile::tempdir;

    use crate::exercise::Exercise;
    use crate::landmarks::Side;
    use crate::segmentation::Phase;
    use crate::session::{
        SessionIdentity, SessionState,
        feedback::{FormLabel, RepRecord, Severity},
    };

    fn rep(index: usize) -> RepRecord {
        RepRecord {
            rep_index: index,
            duration_ms: 1200,
            range: 100.0,
            peak_drift: 0.1,
            confidence_avg: 0.9,
            form_label: FormLabel::Good,
            anomaly_score: 0.2,
            fatigue_index: 0.0,
            side: Side::Right,
            tip_seen: false,
            bad_seen: false,
            ml_drift: false,
            reasons: Vec::new(),
        }
    }

    fn update(latest_rep: Option<RepRecord>) -> FrameUpdate {
        FrameUpdate {
            timestamp_s: 0.0,
            feedback_text: "STATUS: Stable".to_string(),
            severity: Severity::Info,
            rep_count: latest_rep.as_ref().map_or(0, |r| r.rep_index),
            latest_rep,
            last_rep_text: None,
            fatigue_index: 0.0,
            fatigue_warning: false,
            baseline_ready: false,
            top_issues_text: "no major issues".to_string(),
            confidence: 1.0,
            state: SessionState::Running,
            phase: Phase::Resting,
            recent_reps: Vec::new(),
        }
    }

    #[test]
    fn test_rep_log_skips_frames_without_reps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reps.jsonl");
        let (tx, rx) = mpsc::channel();
        tx.send(update(None)).unwrap();
        tx.send(update(Some(rep(1)))).unwrap();
        tx.send(update(None)).unwrap();
        tx.send(update(Some(rep(2)))).unwrap();
        drop(tx);

        assert_eq!(write_rep_log(&path, rx).unwrap(), 2);
        let contents = std::fs::read_to_string(&path).unwrap();
        let reps = contents
            .lines()
            .map(|l| serde_json::from_str::<RepRecord>(l).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(reps, vec![rep(1), rep(2)]);
    }

    #[test]
    fn test_summary_is_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = SessionSummary {
            exercise: Exercise::BicepCurl,
            identity: SessionIdentity::default(),
            reps_total: 1,
            reps_good: 1,
            reps_bad: 0,
            reps_warn: 0,
            form_error_count: 0,
            fatigue_flag: false,
            fatigue_since_rep: None,
            stop_reason: None,
            issue_counts: BTreeMap::new(),
            top_issues: Vec::new(),
            baseline: None,
            reps: vec![rep(1)],
            feedback: Vec::new(),
        };
        write_summary(&path, &summary).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["exercise"], "bicep_curl");
        assert_eq!(value["reps"][0]["form_label"], "good");
    }
}
