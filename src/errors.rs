// Error types for liftright

use std::{io, sync::mpsc::SendError};

use snafu::Snafu;

use crate::session::FrameUpdate;

#[derive(Debug, Snafu)]
pub enum LiftRightError {
    // Session lifecycle errors
    #[snafu(display("Invalid session token: {token}"))]
    InvalidSessionToken { token: String },
    #[snafu(display("Session {token} was stopped and no longer accepts frames"))]
    SessionTerminated { token: String },
    #[snafu(display("Unsupported exercise: {name}"))]
    UnsupportedExercise { name: String },

    // Trained model bundle errors
    #[snafu(display("No trained model registered for {exercise}"))]
    MissingModel { exercise: String },
    #[snafu(display("Model expects features the exercise cannot compute: {}", missing.join(", ")))]
    FeatureMismatch { missing: Vec<String> },
    #[snafu(display("Model bundle is malformed: {reason}"))]
    ModelShapeMismatch { reason: String },
    #[snafu(display("Error reading model bundle"))]
    ModelLoadError { source: io::Error },
    #[snafu(display("Error parsing model bundle"))]
    ModelParseError { source: serde_json::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Replay input and output errors
    #[snafu(display("Invalid landmark file: {path}"))]
    InvalidFrameFile { path: String },
    #[snafu(display("Error loading landmark frames"))]
    FrameLoaderError { source: io::Error },
    #[snafu(display("Error writing session output"))]
    WriterError { source: io::Error },
    #[snafu(display("Error broadcasting frame update"))]
    UpdateBroadcastError { source: Box<SendError<FrameUpdate>> },
}

impl From<SendError<FrameUpdate>> for LiftRightError {
    fn from(value: SendError<FrameUpdate>) -> Self {
        LiftRightError::UpdateBroadcastError {
            source: Box::new(value),
        }
    }
}
