// SPDX-License-Identifier: MIT

//! Remote toolbox client
//!
//! The toolbox speaks JSON-RPC over streamable HTTP: an `initialize`
//! handshake establishes a session id (returned in a response header), after
//! which `tools/call` requests invoke named tools. Responses arrive either
//! as a single JSON document or as an SSE body whose `data:` line carries
//! the JSON payload; the first well-formed payload wins.

pub mod args;
pub mod catalog;

use crate::flow::FlowError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_VERSION: &str = "2025-01-15";
const CALL_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ToolInvoker {
    client: reqwest::Client,
    base_url: String,
    session_id: Mutex<Option<String>>,
    request_id: AtomicU64,
}

impl ToolInvoker {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id: Mutex::new(None),
            request_id: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Establish the session handle if we do not have one yet
    async fn ensure_session(&self) -> Result<String, FlowError> {
        let mut session = self.session_id.lock().await;
        if let Some(id) = session.as_ref() {
            return Ok(id.clone());
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "stratflow-rs",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }
        });

        log::info!("toolbox {}: initializing session", self.base_url);

        let response = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                FlowError::execution("toolbox", "initialize response carried no session id")
            })?;

        *session = Some(id.clone());
        Ok(id)
    }

    /// Invoke a named tool and return the JSON-RPC `result` member
    pub async fn call(&self, tool_name: &str, arguments: Value) -> Result<Value, FlowError> {
        let session_id = self.ensure_session().await?;

        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": "tools/call",
            "params": {
                "name": tool_name,
                "arguments": arguments
            }
        });

        log::info!("toolbox {}: calling tool {}", self.base_url, tool_name);

        let response = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header(SESSION_HEADER, session_id)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let envelope = parse_stream_payload(&body)
            .ok_or_else(|| FlowError::execution(tool_name, "unparseable toolbox response"))?;

        if let Some(error) = envelope.get("error") {
            return Err(FlowError::execution(tool_name, error.to_string()));
        }

        Ok(envelope.get("result").cloned().unwrap_or(envelope))
    }

    /// Invoke a tool with typed arguments and return its human-readable text
    pub async fn call_text(
        &self,
        tool_name: &str,
        arguments: impl serde::Serialize,
    ) -> Result<String, FlowError> {
        let result = self.call(tool_name, serde_json::to_value(arguments)?).await?;
        Ok(result_text(&result))
    }
}

/// First well-formed JSON payload in a response body: an SSE `data:` line if
/// the body streams, otherwise the body itself
pub(crate) fn parse_stream_payload(body: &str) -> Option<Value> {
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(value) = serde_json::from_str(data) {
                return Some(value);
            }
        }
    }
    serde_json::from_str(body).ok()
}

/// The text field of a tool result (`content[0].text`), falling back to the
/// serialized result
pub(crate) fn result_text(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|content| content.first())
        .and_then(|entry| entry.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json_body() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#;
        let value = parse_stream_payload(body).unwrap();
        assert_eq!(value["result"]["ok"], true);
    }

    #[test]
    fn test_parse_sse_body() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"n\":7}}\n\n";
        let value = parse_stream_payload(body).unwrap();
        assert_eq!(value["result"]["n"], 7);
    }

    #[test]
    fn test_parse_sse_body_skips_malformed_data_lines() {
        let body = "data: not-json\ndata: {\"id\":3,\"result\":\"ok\"}\n";
        let value = parse_stream_payload(body).unwrap();
        assert_eq!(value["result"], "ok");
    }

    #[test]
    fn test_parse_garbage_body() {
        assert!(parse_stream_payload("<html>busy</html>").is_none());
    }

    #[test]
    fn test_result_text_from_content() {
        let result = json!({
            "content": [{ "type": "text", "text": "PNG Table URL: https://x.example/t.png" }]
        });
        assert_eq!(
            result_text(&result),
            "PNG Table URL: https://x.example/t.png"
        );
    }

    #[test]
    fn test_result_text_fallback() {
        let result = json!({ "rows": 3 });
        assert_eq!(result_text(&result), r#"{"rows":3}"#);
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let invoker = ToolInvoker::new("https://tools.example.com/");
        assert_eq!(invoker.base_url, "https://tools.example.com");
    }
}
