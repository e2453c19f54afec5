// SPDX-License-Identifier: MIT

//! Typed error handling for stratflow-rs
//!
//! Step-level failures (execution, timeout) are contained by the pipeline and
//! engine and turned into terminal state; session-boundary failures
//! (validation, state) surface to the caller as structured errors.

use thiserror::Error;

/// Top-level error type for workflow execution and session management
#[derive(Debug, Error)]
pub enum FlowError {
    /// Malformed or out-of-precondition external input
    /// (e.g. resume on a session that is not at a checkpoint)
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown session, or a missing/corrupted checkpoint
    #[error("state error: {0}")]
    State(String),

    /// A step's task executor or tool call failed
    #[error("step '{step}' failed: {message}")]
    Execution { step: String, message: String },

    /// A bounded external call exceeded its deadline
    #[error("step '{step}' timed out after {seconds}s")]
    Timeout { step: String, seconds: u64 },

    /// Configuration errors (missing env vars, invalid values)
    #[error("configuration error: {0}")]
    Config(String),

    /// Graph construction errors
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors raised while constructing a pipeline or step graph.
///
/// These are programming errors, not runtime input: they may raise past the
/// engine boundary, unlike step-level failures.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A pipeline or graph was declared with no steps
    #[error("graph '{0}' has no steps")]
    Empty(String),

    /// Two nodes share a name
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),

    /// An edge, entry, error terminal, or interrupt mark names a node
    /// that does not exist
    #[error("node '{referenced_by}' targets undefined node '{target}'")]
    UndefinedTarget {
        referenced_by: String,
        target: String,
    },
}

impl FlowError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    /// Create an execution error for a named step
    pub fn execution(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display() {
        let err = FlowError::execution("data_merger", "connection refused");
        assert!(err.to_string().contains("data_merger"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_timeout_error_display() {
        let err = FlowError::Timeout {
            step: "index_visualizer".to_string(),
            seconds: 300,
        };
        assert!(err.to_string().contains("index_visualizer"));
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn test_graph_error_converts() {
        let err: FlowError = GraphError::DuplicateNode("phase1".to_string()).into();
        assert!(err.to_string().contains("phase1"));
    }

    #[test]
    fn test_undefined_target_display() {
        let err = GraphError::UndefinedTarget {
            referenced_by: "process_user_input".to_string(),
            target: "phase3".to_string(),
        };
        assert!(err.to_string().contains("phase3"));
    }
}
