// SPDX-License-Identifier: MIT

//! Master phase controller
//!
//! Owns the master graph (`phase1 → present_checkpoint → [interrupt]
//! process_user_input → phase2 | deliver_final`) and the session
//! bookkeeping around it. The session store is injected; the controller is
//! cheap to share behind an `Arc`.

pub mod nodes;

use crate::flow::{
    Checkpoint, Edge, Field, FlowError, FnStep, GraphError, Node, Phase, Pipeline, RunOutcome,
    Session, SessionStatus, SessionStore, WorkflowEngine, WorkflowState,
};
use self::nodes::{
    deliver_final, present_checkpoint, process_user_input, route_after_checkpoint, RunPhase1,
    RunPhase2, DELIVER_FINAL, PHASE1, PHASE2, PRESENT_CHECKPOINT, PROCESS_USER_INPUT,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Default trigger text for sessions started without one
pub const DEFAULT_TRIGGER: &str = "Generate the strategic intelligence report";

pub struct PhaseController {
    engine: WorkflowEngine,
    store: Arc<SessionStore>,
}

/// Full status view of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub current_phase: Phase,
    pub phase1_output: Option<String>,
    pub phase2_output: Option<String>,
    pub checkpoint_message: Option<String>,
    pub error: Option<String>,
}

/// One row of the session listing
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub phase: Phase,
}

impl PhaseController {
    /// Wire the master graph around the two sub-pipelines.
    pub fn new(
        competitive: Pipeline,
        audience: Pipeline,
        store: Arc<SessionStore>,
    ) -> Result<Self, GraphError> {
        let nodes = vec![
            Node {
                name: PHASE1,
                step: Arc::new(RunPhase1::new(Arc::new(competitive))),
                edge: Edge::Next(PRESENT_CHECKPOINT),
            },
            Node {
                name: PRESENT_CHECKPOINT,
                step: Arc::new(FnStep::new(
                    PRESENT_CHECKPOINT,
                    &[Field::CompetitiveIntelligence],
                    &[Field::CheckpointMessage],
                    present_checkpoint,
                )),
                edge: Edge::Next(PROCESS_USER_INPUT),
            },
            Node {
                name: PROCESS_USER_INPUT,
                step: Arc::new(FnStep::new(
                    PROCESS_USER_INPUT,
                    &[],
                    &[Field::UserDecision, Field::UserGuidance],
                    process_user_input,
                )),
                edge: Edge::Branch {
                    decide: route_after_checkpoint,
                    advance_to: PHASE2,
                    finish_to: DELIVER_FINAL,
                },
            },
            Node {
                name: PHASE2,
                step: Arc::new(RunPhase2::new(Arc::new(audience))),
                edge: Edge::Next(DELIVER_FINAL),
            },
            Node {
                name: DELIVER_FINAL,
                step: Arc::new(FnStep::new(
                    DELIVER_FINAL,
                    &[Field::UserDecision, Field::Error],
                    &[Field::FinalSummary],
                    deliver_final,
                )),
                edge: Edge::End,
            },
        ];

        let engine = WorkflowEngine::new(
            "strategic_intelligence",
            nodes,
            PHASE1,
            DELIVER_FINAL,
            &[PROCESS_USER_INPUT],
            store.clone(),
        )?;

        Ok(Self { engine, store })
    }

    /// Mint a fresh session id
    pub fn mint_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Register a session so it is visible to status queries before any
    /// work runs
    pub async fn open_session(
        &self,
        session_id: &str,
        trigger: &str,
    ) -> Result<WorkflowState, FlowError> {
        let state = WorkflowState::started(trigger);
        self.store.create(session_id, state.clone()).await?;
        Ok(state)
    }

    /// Drive an opened session until completion or its checkpoint
    pub async fn run_session(
        &self,
        session_id: &str,
        state: WorkflowState,
    ) -> Result<RunOutcome, FlowError> {
        match self.engine.run(session_id, state).await {
            Ok(outcome) => {
                if outcome.suspended_before.is_none() {
                    self.store
                        .finalize(session_id, outcome.state.clone(), SessionStatus::Completed)
                        .await?;
                }
                Ok(outcome)
            }
            Err(e) => {
                let _ = self.store.fail(session_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Open and run in one call (terminal front end, tests)
    pub async fn trigger(
        &self,
        session_id: &str,
        trigger: &str,
    ) -> Result<RunOutcome, FlowError> {
        let state = self.open_session(session_id, trigger).await?;
        self.run_session(session_id, state).await
    }

    /// Claim the session's checkpoint (the compare-and-swap), without
    /// running anything yet. Fails with not-found for unknown sessions and
    /// conflict for sessions that are not suspended.
    pub async fn claim_checkpoint(&self, session_id: &str) -> Result<Checkpoint, FlowError> {
        self.store.begin_resume(session_id).await
    }

    /// Continue a claimed checkpoint with the external input
    pub async fn resume_from(
        &self,
        session_id: &str,
        checkpoint: Checkpoint,
        external_input: &str,
    ) -> Result<RunOutcome, FlowError> {
        match self
            .engine
            .resume_from(session_id, checkpoint, external_input)
            .await
        {
            Ok(outcome) => {
                if outcome.suspended_before.is_none() {
                    self.store
                        .finalize(session_id, outcome.state.clone(), SessionStatus::Completed)
                        .await?;
                }
                Ok(outcome)
            }
            Err(e) => {
                let _ = self.store.fail(session_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Claim and continue in one call (terminal front end, tests)
    pub async fn resume(
        &self,
        session_id: &str,
        external_input: &str,
    ) -> Result<RunOutcome, FlowError> {
        let checkpoint = self.claim_checkpoint(session_id).await?;
        self.resume_from(session_id, checkpoint, external_input).await
    }

    pub async fn status(&self, session_id: &str) -> Option<SessionSnapshot> {
        let session = self.store.get(session_id).await?;
        Some(snapshot(&session))
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        self.store
            .list()
            .await
            .into_iter()
            .map(|session| SessionSummary {
                session_id: session.id.clone(),
                status: session.status,
                phase: session.state.phase(),
            })
            .collect()
    }
}

fn snapshot(session: &Session) -> SessionSnapshot {
    let state = &session.state;

    let creative = state
        .text(Field::CreativeIntelligence)
        .filter(|text| !text.is_empty());
    let summary = state
        .text(Field::FinalSummary)
        .filter(|text| !text.is_empty());
    let phase2_output = match (creative, summary) {
        (Some(creative), Some(summary)) => Some(format!("{}\n\n{}", creative, summary)),
        (Some(creative), None) => Some(creative.to_string()),
        (None, Some(summary)) => Some(summary.to_string()),
        (None, None) => None,
    };

    SessionSnapshot {
        session_id: session.id.clone(),
        status: session.status,
        current_phase: state.phase(),
        phase1_output: state
            .text(Field::CompetitiveIntelligence)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        phase2_output,
        checkpoint_message: state.text(Field::CheckpointMessage).map(str::to_string),
        error: state.error().map(str::to_string),
    }
}
