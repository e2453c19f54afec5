// SPDX-License-Identifier: MIT

//! Sequential pipeline runner
//!
//! Executes an ordered list of named steps with exactly one branch: success
//! advances to the next step; any step error is captured into the state's
//! error field and execution jumps to the fixed error-terminal step, which
//! composes a minimal failure report. The runner itself never fails.

use crate::flow::error::GraphError;
use crate::flow::state::WorkflowState;
use crate::flow::step::Step;
use std::collections::HashSet;
use std::sync::Arc;

pub struct Pipeline {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    error_step: Arc<dyn Step>,
}

impl Pipeline {
    /// Build a pipeline, validating the step list up front.
    pub fn new(
        name: impl Into<String>,
        steps: Vec<Arc<dyn Step>>,
        error_step: Arc<dyn Step>,
    ) -> Result<Self, GraphError> {
        let name = name.into();
        if steps.is_empty() {
            return Err(GraphError::Empty(name));
        }

        let mut seen = HashSet::new();
        for step in steps.iter().chain(std::iter::once(&error_step)) {
            if !seen.insert(step.name().to_string()) {
                return Err(GraphError::DuplicateNode(step.name().to_string()));
            }
        }

        Ok(Self {
            name,
            steps,
            error_step,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered steps, exposed so tests can check declared field contracts
    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Run every step in order against the state.
    ///
    /// Always returns a terminal state; step failures are recorded in the
    /// error field and routed through the error-terminal step.
    pub async fn run(&self, state: WorkflowState) -> WorkflowState {
        let mut state = state;

        for step in &self.steps {
            state = state.with_step(step.name());
            log::info!("pipeline {}: executing step {}", self.name, step.name());

            match step.apply(state.clone()).await {
                Ok(next) => state = next,
                Err(e) => {
                    log::error!("pipeline {}: step {} failed: {}", self.name, step.name(), e);
                    let failed = state.with_error(e.to_string());
                    return match self.error_step.apply(failed.clone()).await {
                        Ok(terminal) => terminal.with_step(self.error_step.name()),
                        Err(terminal_err) => {
                            log::error!(
                                "pipeline {}: error terminal {} failed: {}",
                                self.name,
                                self.error_step.name(),
                                terminal_err
                            );
                            failed
                        }
                    };
                }
            }
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::error::FlowError;
    use crate::flow::state::Field;
    use crate::flow::step::FnStep;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingStep {
        name: String,
        fail: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Step for RecordingStep {
        fn name(&self) -> &str {
            &self.name
        }

        async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
            self.calls.lock().unwrap().push(self.name.clone());
            if self.fail {
                return Err(FlowError::execution(&self.name, "boom"));
            }
            Ok(state.with_text(Field::CepAnalysis, format!("ran {}", self.name)))
        }
    }

    fn recording(
        name: &str,
        fail: bool,
        calls: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Step> {
        Arc::new(RecordingStep {
            name: name.to_string(),
            fail,
            calls: calls.clone(),
        })
    }

    fn failure_report(state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let message = format!(
            "Error occurred: {}",
            state.error().unwrap_or("unknown error")
        );
        Ok(state.with_text(Field::FinalReport, message))
    }

    fn error_step() -> Arc<dyn Step> {
        Arc::new(FnStep::new("error", &[Field::Error], &[Field::FinalReport], failure_report))
    }

    #[tokio::test]
    async fn test_runs_steps_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            "test",
            vec![
                recording("a", false, &calls),
                recording("b", false, &calls),
                recording("c", false, &calls),
            ],
            error_step(),
        )
        .unwrap();

        let out = pipeline.run(WorkflowState::empty()).await;

        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(out.error().is_none());
        assert_eq!(out.step(), Some("c"));
    }

    #[tokio::test]
    async fn test_failure_short_circuits_to_error_terminal() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            "test",
            vec![
                recording("a", false, &calls),
                recording("b", true, &calls),
                recording("c", false, &calls),
            ],
            error_step(),
        )
        .unwrap();

        let out = pipeline.run(WorkflowState::empty()).await;

        // c never ran
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
        assert!(out.error().unwrap().contains("boom"));
        assert!(out
            .text(Field::FinalReport)
            .unwrap()
            .starts_with("Error occurred:"));
        assert_eq!(out.step(), Some("error"));
    }

    #[tokio::test]
    async fn test_empty_pipeline_rejected() {
        let result = Pipeline::new("empty", vec![], error_step());
        assert!(matches!(result, Err(GraphError::Empty(_))));
    }

    #[tokio::test]
    async fn test_duplicate_step_rejected() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let result = Pipeline::new(
            "dup",
            vec![recording("a", false, &calls), recording("a", false, &calls)],
            error_step(),
        );
        assert!(matches!(result, Err(GraphError::DuplicateNode(_))));
    }
}
