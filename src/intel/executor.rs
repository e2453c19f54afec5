// SPDX-License-Identifier: MIT

//! Task executor contract and production implementations
//!
//! A [`TaskExecutor`] is the opaque unit a pipeline step delegates its
//! generative or tool work to: text in, text out, bounded by a timeout. The
//! core only defines the contract; retry policy, if any, belongs to whoever
//! supplies the implementation.

use crate::flow::FlowError;
use crate::intel::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Returns the executor name (used in diagnostics)
    fn name(&self) -> &str;

    /// Transform the step's composed input into textual output
    async fn execute(&self, input: &str) -> Result<String, FlowError>;
}

/// Wraps another executor with a hard deadline.
///
/// Expiry surfaces as [`FlowError::Timeout`], which the pipeline treats like
/// any other execution failure.
pub struct TimedExecutor {
    inner: Arc<dyn TaskExecutor>,
    timeout: Duration,
}

impl TimedExecutor {
    pub fn new(inner: Arc<dyn TaskExecutor>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl TaskExecutor for TimedExecutor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, input: &str) -> Result<String, FlowError> {
        match tokio::time::timeout(self.timeout, self.inner.execute(input)).await {
            Ok(result) => result,
            Err(_) => Err(FlowError::Timeout {
                step: self.inner.name().to_string(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

/// Chat-completions-backed executor with a fixed instruction profile.
///
/// Talks to any OpenAI-compatible endpoint; the profile is sent as the
/// system message, the step's composed input as the user message.
pub struct ChatExecutor {
    client: Client,
    name: String,
    instructions: String,
    api_key: String,
    base_url: String,
    model_name: String,
}

impl ChatExecutor {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        config: &Config,
    ) -> Result<Self, FlowError> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self {
            client: Client::new(),
            name: name.into(),
            instructions: instructions.into(),
            api_key,
            base_url: config.openai_base_url.clone(),
            model_name: config.model_name.clone(),
        })
    }

    fn parse_response(name: &str, response: &serde_json::Value) -> Result<String, FlowError> {
        response["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .and_then(|choice| choice["message"]["content"].as_str())
            .map(str::to_string)
            .ok_or_else(|| FlowError::execution(name, "no content in chat response"))
    }
}

#[async_trait]
impl TaskExecutor for ChatExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: &str) -> Result<String, FlowError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": self.model_name,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": self.instructions },
                { "role": "user", "content": input }
            ]
        });

        log::debug!("chat executor {}: requesting {}", self.name, url);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(FlowError::execution(
                &self.name,
                format!("chat API error ({}): {}", status, text),
            ));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        Self::parse_response(&self.name, &resp_json)
    }
}
