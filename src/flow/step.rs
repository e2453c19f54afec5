// SPDX-License-Identifier: MIT

//! The step contract shared by pipeline steps and master-graph nodes

use crate::flow::error::FlowError;
use crate::flow::state::{Field, WorkflowState};
use async_trait::async_trait;

/// A named pure transform over [`WorkflowState`].
///
/// `reads`/`writes` declare the step's field contract. They are not enforced
/// at runtime; the test suite checks that a pipeline's steps only read fields
/// that were seeded or written by an earlier step.
#[async_trait]
pub trait Step: Send + Sync {
    /// Returns the step name (unique within its pipeline or graph)
    fn name(&self) -> &str;

    /// Fields this step consumes
    fn reads(&self) -> &[Field] {
        &[]
    }

    /// Fields this step produces
    fn writes(&self) -> &[Field] {
        &[]
    }

    /// Produce the next state from the incoming one
    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError>;
}

/// Adapter for synchronous function steps (checkpoint formatting, routing
/// bookkeeping, report compilation)
pub struct FnStep {
    name: &'static str,
    reads: &'static [Field],
    writes: &'static [Field],
    apply: fn(WorkflowState) -> Result<WorkflowState, FlowError>,
}

impl FnStep {
    pub fn new(
        name: &'static str,
        reads: &'static [Field],
        writes: &'static [Field],
        apply: fn(WorkflowState) -> Result<WorkflowState, FlowError>,
    ) -> Self {
        Self {
            name,
            reads,
            writes,
            apply,
        }
    }
}

#[async_trait]
impl Step for FnStep {
    fn name(&self) -> &str {
        self.name
    }

    fn reads(&self) -> &[Field] {
        self.reads
    }

    fn writes(&self) -> &[Field] {
        self.writes
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        (self.apply)(state)
    }
}
