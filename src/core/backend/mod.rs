//! Contract between the inspector engine and the proxy backend.
//!
//! The engine only ever talks to an [`InspectorBackend`]. The production
//! implementation is [`http::HttpBackend`]; tests drive the engine through a
//! scripted in-memory backend instead.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::api::{
    CallTarget, CancelCallRequest, CloseSessionRequest, GetPromptRequest, OpenSessionRequest,
    ReadResourceRequest, Session, StartCallRequest, StartCallResponse,
};
use crate::core::arguments::ToolDescriptor;

pub mod http;
pub mod sse;

/// Raw text frames of one call's event stream, one JSON event per item.
pub type EventFrames = BoxStream<'static, Result<String, BackendError>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Expected an event stream, got '{0}'")]
    NotAnEventStream(String),
}

#[async_trait]
pub trait InspectorBackend: Send + Sync {
    async fn open_session(&self, request: &OpenSessionRequest) -> Result<Session, BackendError>;

    async fn close_session(&self, request: &CloseSessionRequest) -> Result<(), BackendError>;

    async fn start_call(&self, request: &StartCallRequest)
        -> Result<StartCallResponse, BackendError>;

    async fn cancel_call(&self, request: &CancelCallRequest) -> Result<(), BackendError>;

    /// Opens the event stream of `call_id`. The returned stream ends when the
    /// backend closes the connection.
    async fn open_event_stream(&self, call_id: &str) -> Result<EventFrames, BackendError>;

    async fn list_tools(&self, target: &CallTarget) -> Result<Vec<ToolDescriptor>, BackendError>;

    async fn read_resource(&self, request: &ReadResourceRequest) -> Result<Value, BackendError>;

    async fn get_prompt(&self, request: &GetPromptRequest) -> Result<Value, BackendError>;
}

/// Pulls a one-line summary out of an error body.
///
/// JSON bodies are searched for `error.message`, a string `error`, or a
/// top-level `message`; anything else is returned trimmed.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|value| extract_error_summary(&value))
        .filter(|summary| !summary.is_empty())
        .unwrap_or_else(|| trimmed.to_string())
}

fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_nested_error_messages() {
        assert_eq!(
            summarize_error_body(r#"{"error":{"message":"call   already\nfinished"}}"#),
            "call already finished"
        );
        assert_eq!(
            summarize_error_body(r#"{"error":"session expired"}"#),
            "session expired"
        );
        assert_eq!(summarize_error_body(r#"{"message":"nope"}"#), "nope");
    }

    #[test]
    fn falls_back_to_trimmed_text() {
        assert_eq!(summarize_error_body("  bad gateway \n"), "bad gateway");
        assert_eq!(summarize_error_body(r#"{"detail":1}"#), r#"{"detail":1}"#);
        assert_eq!(summarize_error_body(""), "<empty body>");
    }
}
