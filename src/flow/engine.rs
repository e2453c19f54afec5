// SPDX-License-Identifier: MIT

//! Directed-step workflow engine with declared interrupt points
//!
//! The engine executes named nodes in graph order. Before a node listed in
//! `interrupt_before` runs, the engine persists a checkpoint keyed by the
//! session id and returns without doing further work; `resume` claims the
//! checkpoint, injects the external input as a human message, and continues
//! by executing the suspended-before node (it never ran).
//!
//! Step failures never escape the engine: they are written to the state's
//! error field and execution is redirected to the designated error-terminal
//! node. Only construction-time graph errors and session-boundary errors
//! (unknown session, missing checkpoint) are returned as `Err`.

use crate::flow::error::{FlowError, GraphError};
use crate::flow::session::{Checkpoint, SessionStore};
use crate::flow::state::{Message, WorkflowState};
use crate::flow::step::Step;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Safety bound on node transitions within a single run
const MAX_HOPS: usize = 100;

/// Closed set of labels a routing function may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchLabel {
    /// Take the branch's advance target
    Advance,
    /// Take the branch's finish target
    Finish,
}

/// Outgoing edge of a node
pub enum Edge {
    /// Unconditional transition
    Next(&'static str),
    /// Two-way conditional transition; the decide function's return type is
    /// closed, and both targets are validated at construction
    Branch {
        decide: fn(&WorkflowState) -> BranchLabel,
        advance_to: &'static str,
        finish_to: &'static str,
    },
    /// Terminal node
    End,
}

/// A named node: its step and its outgoing edge
pub struct Node {
    pub name: &'static str,
    pub step: Arc<dyn Step>,
    pub edge: Edge,
}

/// Result of driving a session: the latest state, and where execution
/// suspended (if it did)
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: WorkflowState,
    pub suspended_before: Option<&'static str>,
}

pub struct WorkflowEngine {
    name: String,
    nodes: HashMap<&'static str, Node>,
    entry: &'static str,
    error_node: &'static str,
    interrupt_before: HashSet<&'static str>,
    store: Arc<SessionStore>,
}

impl WorkflowEngine {
    /// Build and validate the graph.
    ///
    /// Duplicate node names, or an entry / error terminal / interrupt mark /
    /// edge target naming an undefined node, are construction errors.
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<Node>,
        entry: &'static str,
        error_node: &'static str,
        interrupt_before: &[&'static str],
        store: Arc<SessionStore>,
    ) -> Result<Self, GraphError> {
        let name = name.into();
        if nodes.is_empty() {
            return Err(GraphError::Empty(name));
        }

        let mut map: HashMap<&'static str, Node> = HashMap::new();
        for node in nodes {
            let node_name = node.name;
            if map.insert(node_name, node).is_some() {
                return Err(GraphError::DuplicateNode(node_name.to_string()));
            }
        }

        let check = |referenced_by: &str, target: &'static str| -> Result<(), GraphError> {
            if map.contains_key(target) {
                Ok(())
            } else {
                Err(GraphError::UndefinedTarget {
                    referenced_by: referenced_by.to_string(),
                    target: target.to_string(),
                })
            }
        };

        check("entry", entry)?;
        check("error terminal", error_node)?;
        for mark in interrupt_before {
            check("interrupt mark", mark)?;
        }
        for node in map.values() {
            match node.edge {
                Edge::Next(target) => check(node.name, target)?,
                Edge::Branch {
                    advance_to,
                    finish_to,
                    ..
                } => {
                    check(node.name, advance_to)?;
                    check(node.name, finish_to)?;
                }
                Edge::End => {}
            }
        }

        Ok(Self {
            name,
            nodes: map,
            entry,
            error_node,
            interrupt_before: interrupt_before.iter().copied().collect(),
            store,
        })
    }

    /// Execute from the entry node until completion or the first interrupt
    /// point.
    pub async fn run(
        &self,
        session_id: &str,
        state: WorkflowState,
    ) -> Result<RunOutcome, FlowError> {
        self.drive(session_id, state, self.entry, false).await
    }

    /// Execute starting at an arbitrary node instead of the entry
    pub async fn run_from(
        &self,
        session_id: &str,
        state: WorkflowState,
        from: &str,
    ) -> Result<RunOutcome, FlowError> {
        let start = self
            .nodes
            .get_key_value(from)
            .map(|(name, _)| *name)
            .ok_or_else(|| FlowError::state(format!("unknown step '{}'", from)))?;
        self.drive(session_id, state, start, false).await
    }

    /// Claim the session's checkpoint and continue with the external input
    /// appended as a human message. Fails with a state error when no
    /// checkpoint exists and a validation error when the session is not
    /// suspended.
    pub async fn resume(
        &self,
        session_id: &str,
        external_input: &str,
    ) -> Result<RunOutcome, FlowError> {
        let checkpoint = self.store.begin_resume(session_id).await?;
        self.resume_from(session_id, checkpoint, external_input).await
    }

    /// Continue from an already-claimed checkpoint.
    ///
    /// Split from [`resume`](Self::resume) so callers can acknowledge the
    /// claim immediately and run the remainder in the background.
    pub async fn resume_from(
        &self,
        session_id: &str,
        checkpoint: Checkpoint,
        external_input: &str,
    ) -> Result<RunOutcome, FlowError> {
        let start = self
            .nodes
            .get_key_value(checkpoint.resume_at.as_str())
            .map(|(name, _)| *name)
            .ok_or_else(|| {
                FlowError::state(format!(
                    "checkpoint for session '{}' references unknown step '{}'",
                    session_id, checkpoint.resume_at
                ))
            })?;

        let state = checkpoint
            .state
            .with_message(Message::human(external_input));
        self.drive(session_id, state, start, true).await
    }

    async fn drive(
        &self,
        session_id: &str,
        mut state: WorkflowState,
        start: &'static str,
        mut skip_interrupt: bool,
    ) -> Result<RunOutcome, FlowError> {
        let mut current = start;

        for _hop in 0..MAX_HOPS {
            if !skip_interrupt && self.interrupt_before.contains(current) {
                log::info!(
                    "workflow {}: suspending session {} before node {}",
                    self.name,
                    session_id,
                    current
                );
                self.store
                    .save_checkpoint(session_id, state.clone(), current)
                    .await?;
                return Ok(RunOutcome {
                    state,
                    suspended_before: Some(current),
                });
            }
            skip_interrupt = false;

            let node = &self.nodes[current];
            state = state.with_step(current);
            log::info!("workflow {}: executing node {}", self.name, current);

            match node.step.apply(state.clone()).await {
                Ok(next) => state = next,
                Err(e) => {
                    log::error!("workflow {}: node {} failed: {}", self.name, current, e);
                    state = state.with_error(format!("{} failed: {}", current, e));
                    if current == self.error_node {
                        // The error terminal itself failed; stop here rather
                        // than loop back into it.
                        return Ok(RunOutcome {
                            state,
                            suspended_before: None,
                        });
                    }
                    current = self.error_node;
                    continue;
                }
            }

            current = match node.edge {
                Edge::Next(target) => target,
                Edge::Branch {
                    decide,
                    advance_to,
                    finish_to,
                } => match decide(&state) {
                    BranchLabel::Advance => advance_to,
                    BranchLabel::Finish => finish_to,
                },
                Edge::End => {
                    return Ok(RunOutcome {
                        state,
                        suspended_before: None,
                    })
                }
            };
        }

        log::error!(
            "workflow {}: session {} exceeded {} node transitions",
            self.name,
            session_id,
            MAX_HOPS
        );
        Ok(RunOutcome {
            state: state.with_error(format!("exceeded {} node transitions", MAX_HOPS)),
            suspended_before: None,
        })
    }
}
