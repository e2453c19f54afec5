// SPDX-License-Identifier: MIT

//! Generic workflow kit: immutable state, the step contract, the sequential
//! pipeline runner, the interruptible graph engine, and the session store.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod state;
pub mod step;

pub use engine::{BranchLabel, Edge, Node, RunOutcome, WorkflowEngine};
pub use error::{FlowError, GraphError};
pub use pipeline::Pipeline;
pub use session::{Checkpoint, Session, SessionStatus, SessionStore};
pub use state::{Field, Message, Phase, Role, WorkflowState};
pub use step::{FnStep, Step};
