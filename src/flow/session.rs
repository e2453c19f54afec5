// SPDX-License-Identifier: MIT

//! Session registry and checkpoint persistence
//!
//! The [`SessionStore`] is the only shared mutable resource in the system.
//! It is constructed at service start and injected wherever it is needed;
//! resume is serialized by a compare-and-swap on the session status under
//! the store's write lock, so a second resume on a session that is not at a
//! checkpoint fails immediately instead of racing an in-flight one.

use crate::flow::error::FlowError;
use crate::flow::state::WorkflowState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Checkpoint,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Checkpoint => "checkpoint",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

/// Persisted suspension point: the state snapshot plus the name of the step
/// execution is suspended before. Consumed and cleared on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: WorkflowState,
    pub resume_at: String,
}

/// One in-flight instance of the master workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    pub state: WorkflowState,
    pub checkpoint: Option<Checkpoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory session registry keyed by session id
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new session with status running.
    ///
    /// Exactly one session may exist per id.
    pub async fn create(&self, id: &str, state: WorkflowState) -> Result<(), FlowError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(FlowError::validation(format!(
                "session '{}' already exists",
                id
            )));
        }

        let now = Utc::now();
        sessions.insert(
            id.to_string(),
            Session {
                id: id.to_string(),
                status: SessionStatus::Running,
                state,
                checkpoint: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// All known sessions, oldest first
    pub async fn list(&self) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<Session> = sessions.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Persist a checkpoint for a suspended session and mark it as waiting
    /// for external input.
    pub async fn save_checkpoint(
        &self,
        id: &str,
        state: WorkflowState,
        resume_at: &str,
    ) -> Result<(), FlowError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| FlowError::state(format!("unknown session '{}'", id)))?;

        session.checkpoint = Some(Checkpoint {
            state: state.clone(),
            resume_at: resume_at.to_string(),
        });
        session.state = state;
        session.status = SessionStatus::Checkpoint;
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Claim the pending checkpoint for resumption.
    ///
    /// Compare-and-swap under the write lock: the session must exist and be
    /// at status checkpoint; on success the status flips to running and the
    /// checkpoint is consumed, so a concurrent second resume fails.
    pub async fn begin_resume(&self, id: &str) -> Result<Checkpoint, FlowError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| FlowError::state(format!("unknown session '{}'", id)))?;

        if session.status != SessionStatus::Checkpoint {
            return Err(FlowError::validation(format!(
                "cannot resume session '{}': status is '{}'",
                id,
                session.status.as_str()
            )));
        }

        let checkpoint = session
            .checkpoint
            .take()
            .ok_or_else(|| FlowError::state(format!("session '{}' has no checkpoint", id)))?;

        session.status = SessionStatus::Running;
        session.updated_at = Utc::now();
        Ok(checkpoint)
    }

    /// Record a terminal state and status; clears any leftover checkpoint.
    pub async fn finalize(
        &self,
        id: &str,
        state: WorkflowState,
        status: SessionStatus,
    ) -> Result<(), FlowError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| FlowError::state(format!("unknown session '{}'", id)))?;

        session.state = state;
        session.status = status;
        session.checkpoint = None;
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Mark a session as failed at the infrastructure level
    pub async fn fail(&self, id: &str, message: &str) -> Result<(), FlowError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| FlowError::state(format!("unknown session '{}'", id)))?;

        session.state = session.state.with_error(message);
        session.status = SessionStatus::Error;
        session.checkpoint = None;
        session.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
