// Library interface for liftright
// The replay binary, integration tests and benches all drive the engine through here

pub mod arbitration;
pub mod config;
pub mod errors;
pub mod exercise;
pub mod fatigue;
pub mod landmarks;
pub mod scoring;
pub mod segmentation;
pub mod session;
pub mod stats;
pub mod writer;

// Re-export commonly used types
pub use config::EngineConfig;
pub use errors::LiftRightError;
pub use exercise::Exercise;
pub use landmarks::{Joint, Landmark, LandmarkFrame};
pub use session::{FrameUpdate, SessionIdentity, SessionRegistry, SessionSummary, SessionToken};
