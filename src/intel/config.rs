// SPDX-License-Identifier: MIT

//! Environment-driven configuration

use crate::flow::FlowError;
use std::env;

/// Runtime configuration, read once at startup.
///
/// `OPENAI_API_KEY` is only required when the chat-backed executors are
/// wired (the `serve`, `run`, and `phase1` commands); everything else has a
/// default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary toolbox server (data merging, CEP analysis, slide building)
    pub primary_toolbox_url: String,
    /// Secondary toolbox server (visualizations, audience data)
    pub secondary_toolbox_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model_name: String,
    /// Deadline for one executor call
    pub step_timeout_secs: u64,
    pub port: u16,
}

const DEFAULT_PRIMARY_TOOLBOX: &str = "https://web-dan.up.railway.app";
const DEFAULT_SECONDARY_TOOLBOX: &str = "https://web-aditi.up.railway.app";
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;
const DEFAULT_PORT: u16 = 8000;

impl Config {
    pub fn from_env() -> Result<Self, FlowError> {
        let step_timeout_secs = match env::var("STEP_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| FlowError::config(format!("invalid STEP_TIMEOUT_SECS '{}'", raw)))?,
            Err(_) => DEFAULT_STEP_TIMEOUT_SECS,
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| FlowError::config(format!("invalid PORT '{}'", raw)))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            primary_toolbox_url: env::var("PRIMARY_TOOLBOX_URL")
                .unwrap_or_else(|_| DEFAULT_PRIMARY_TOOLBOX.to_string()),
            secondary_toolbox_url: env::var("SECONDARY_TOOLBOX_URL")
                .unwrap_or_else(|_| DEFAULT_SECONDARY_TOOLBOX.to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE.to_string()),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            step_timeout_secs,
            port,
        })
    }

    /// The API key, or a config error for wiring paths that need it
    pub fn require_api_key(&self) -> Result<&str, FlowError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| FlowError::config("OPENAI_API_KEY must be set"))
    }
}
