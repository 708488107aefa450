use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    LiftRightError, config::EngineConfig, exercise::Exercise, landmarks::LandmarkFrame,
    scoring::AnomalyModel,
};

use super::{FrameUpdate, Session, SessionIdentity, SessionSummary};

/// Opaque handle returned by [`SessionRegistry::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(Uuid);

impl SessionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for SessionToken {
    type Err = LiftRightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| LiftRightError::InvalidSessionToken {
                token: s.to_string(),
            })
    }
}

/// A finished session leaves `None` behind for any caller still holding the slot.
type SessionSlot = Arc<Mutex<Option<Session>>>;

/// Directory of live sessions.
///
/// Sessions are independent: each one sits behind its own lock so frames for
/// different tokens can be processed from different threads, while frames for
/// the same token are applied one at a time.
pub struct SessionRegistry {
    config: EngineConfig,
    models: RwLock<HashMap<Exercise, Arc<dyn AnomalyModel>>>,
    sessions: RwLock<HashMap<SessionToken, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            models: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Make a trained model available to new sessions of `exercise`.
    pub fn register_model(&self, exercise: Exercise, model: Arc<dyn AnomalyModel>) {
        info!(
            "Registered model for {exercise} ({} features)",
            model.features().len()
        );
        self.models.write().insert(exercise, model);
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn contains(&self, token: SessionToken) -> bool {
        self.sessions.read().contains_key(&token)
    }

    pub fn start(
        &self,
        exercise: Exercise,
        identity: SessionIdentity,
    ) -> Result<SessionToken, LiftRightError> {
        let model = self
            .models
            .read()
            .get(&exercise)
            .cloned()
            .ok_or(LiftRightError::MissingModel {
                exercise: exercise.to_string(),
            })?;

        let token = SessionToken::new();
        let session = Session::new(token, exercise, identity, &self.config, model)?;
        self.sessions
            .write()
            .insert(token, Arc::new(Mutex::new(Some(session))));
        info!("Started {exercise} session {token}");
        Ok(token)
    }

    pub fn update(
        &self,
        token: SessionToken,
        frame: &LandmarkFrame,
    ) -> Result<FrameUpdate, LiftRightError> {
        let slot = self.slot(token)?;
        let mut guard = slot.lock();
        match guard.as_mut() {
            Some(session) => session.update(frame),
            None => Err(Self::rejected(token)),
        }
    }

    /// Remove the session and return its summary. The token is rejected from
    /// then on.
    pub fn finish(&self, token: SessionToken) -> Result<SessionSummary, LiftRightError> {
        let slot = self
            .sessions
            .write()
            .remove(&token)
            .ok_or_else(|| Self::rejected(token))?;
        let session = slot.lock().take().ok_or_else(|| Self::rejected(token))?;
        Ok(session.finish())
    }

    fn slot(&self, token: SessionToken) -> Result<SessionSlot, LiftRightError> {
        self.sessions
            .read()
            .get(&token)
            .cloned()
            .ok_or_else(|| Self::rejected(token))
    }

    fn rejected(token: SessionToken) -> LiftRightError {
        warn!("Rejected unknown session token {token}");
        LiftRightError::InvalidSessionToken {
            token: token.to_string(),
        }
    }
}
