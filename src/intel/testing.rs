// SPDX-License-Identifier: MIT

//! Shared test support: canned executors and the field-contract check

use crate::flow::{Field, FlowError, Pipeline};
use crate::intel::executor::TaskExecutor;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Executor returning a fixed response
pub struct FixedExecutor {
    name: String,
    response: String,
}

#[async_trait]
impl TaskExecutor for FixedExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _input: &str) -> Result<String, FlowError> {
        Ok(self.response.clone())
    }
}

pub fn fixed(name: &str, response: &str) -> Arc<dyn TaskExecutor> {
    Arc::new(FixedExecutor {
        name: name.to_string(),
        response: response.to_string(),
    })
}

/// Executor that always fails
pub struct FailingExecutor {
    name: String,
    message: String,
}

#[async_trait]
impl TaskExecutor for FailingExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _input: &str) -> Result<String, FlowError> {
        Err(FlowError::execution(&self.name, &self.message))
    }
}

pub fn failing(name: &str, message: &str) -> Arc<dyn TaskExecutor> {
    Arc::new(FailingExecutor {
        name: name.to_string(),
        message: message.to_string(),
    })
}

/// Assert that every field a step declares it reads was either seeded into
/// the pipeline or written by an earlier step.
pub fn assert_reads_satisfied(pipeline: &Pipeline, seeds: &[Field]) {
    let mut available: HashSet<Field> = seeds.iter().copied().collect();

    for step in pipeline.steps() {
        for read in step.reads() {
            assert!(
                available.contains(read),
                "pipeline {}: step {} reads {:?} before any step writes it",
                pipeline.name(),
                step.name(),
                read
            );
        }
        available.extend(step.writes().iter().copied());
    }
}
