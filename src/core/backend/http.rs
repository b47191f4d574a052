use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::sse::{is_event_stream_content_type, sse_frames};
use super::{summarize_error_body, BackendError, EventFrames, InspectorBackend};
use crate::api::{
    CallTarget, CancelCallRequest, CloseSessionRequest, GetPromptRequest, ListToolsRequest,
    ListToolsResponse, OpenSessionRequest, ReadResourceRequest, Session, StartCallRequest,
    StartCallResponse,
};
use crate::core::arguments::ToolDescriptor;
use crate::utils::url::{endpoint_url, endpoint_url_with_segments};

const SESSIONS_ENDPOINT: &str = "inspector/sessions";
const SESSION_CLOSE_ENDPOINT: &str = "inspector/sessions/close";
const CALLS_ENDPOINT: &str = "inspector/calls";
const CALL_CANCEL_ENDPOINT: &str = "inspector/calls/cancel";
const TOOLS_LIST_ENDPOINT: &str = "inspector/tools/list";
const RESOURCE_READ_ENDPOINT: &str = "inspector/resources/read";
const PROMPT_GET_ENDPOINT: &str = "inspector/prompts/get";
const EVENT_STREAM_ACCEPT: &str = "text/event-stream";

pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const POOL_MAX_IDLE_PER_HOST: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }
}

/// Talks to the proxy's inspector endpoints over HTTP.
///
/// Request/response calls share a client with a total request timeout.
/// Event streams use a second client without one, since a call may run for
/// as long as the backend allows.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECONDS))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            stream_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        endpoint_url(&self.base_url, endpoint)
    }

    async fn post_json<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self.post(endpoint, body).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        serde_json::from_slice::<Resp>(&bytes).map_err(|err| BackendError::Decode(err.to_string()))
    }

    async fn post_ack<Req>(&self, endpoint: &str, body: &Req) -> Result<(), BackendError>
    where
        Req: Serialize + Sync + ?Sized,
    {
        self.post(endpoint, body).await.map(|_| ())
    }

    async fn post<Req>(&self, endpoint: &str, body: &Req) -> Result<reqwest::Response, BackendError>
    where
        Req: Serialize + Sync + ?Sized,
    {
        let url = self.url(endpoint);
        debug!(url = %url, "Sending inspector request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        message: summarize_error_body(&body),
    })
}

#[async_trait]
impl InspectorBackend for HttpBackend {
    async fn open_session(&self, request: &OpenSessionRequest) -> Result<Session, BackendError> {
        self.post_json(SESSIONS_ENDPOINT, request).await
    }

    async fn close_session(&self, request: &CloseSessionRequest) -> Result<(), BackendError> {
        self.post_ack(SESSION_CLOSE_ENDPOINT, request).await
    }

    async fn start_call(
        &self,
        request: &StartCallRequest,
    ) -> Result<StartCallResponse, BackendError> {
        self.post_json(CALLS_ENDPOINT, request).await
    }

    async fn cancel_call(&self, request: &CancelCallRequest) -> Result<(), BackendError> {
        self.post_ack(CALL_CANCEL_ENDPOINT, request).await
    }

    async fn open_event_stream(&self, call_id: &str) -> Result<EventFrames, BackendError> {
        let url = endpoint_url_with_segments(&self.base_url, CALLS_ENDPOINT, &[call_id, "events"])
            .map_err(BackendError::Transport)?;
        debug!(call_id = %call_id, url = %url, "Opening call event stream");
        let response = self
            .stream_client
            .get(url)
            .header(reqwest::header::ACCEPT, EVENT_STREAM_ACCEPT)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let response = ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_event_stream_content_type(&content_type) {
            return Err(BackendError::NotAnEventStream(content_type));
        }

        Ok(sse_frames(Box::pin(response.bytes_stream())))
    }

    async fn list_tools(&self, target: &CallTarget) -> Result<Vec<ToolDescriptor>, BackendError> {
        let request = ListToolsRequest {
            target: target.clone(),
        };
        let response: ListToolsResponse = self.post_json(TOOLS_LIST_ENDPOINT, &request).await?;
        Ok(response.tools)
    }

    async fn read_resource(&self, request: &ReadResourceRequest) -> Result<Value, BackendError> {
        self.post_json(RESOURCE_READ_ENDPOINT, request).await
    }

    async fn get_prompt(&self, request: &GetPromptRequest) -> Result<Value, BackendError> {
        self.post_json(PROMPT_GET_ENDPOINT, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_without_double_slashes() {
        let backend = HttpBackend::new("http://127.0.0.1:8080/api/", HttpTimeouts::default())
            .expect("client");
        assert_eq!(
            backend.url(SESSIONS_ENDPOINT),
            "http://127.0.0.1:8080/api/inspector/sessions"
        );
        assert_eq!(
            backend.url(CALL_CANCEL_ENDPOINT),
            "http://127.0.0.1:8080/api/inspector/calls/cancel"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_reports_transport_error() {
        let backend = HttpBackend::new(
            "http://127.0.0.1:9/api",
            HttpTimeouts {
                connect: Duration::from_millis(200),
                request: Duration::from_millis(500),
            },
        )
        .expect("client");
        let err = backend
            .cancel_call(&CancelCallRequest {
                call_id: "c1".into(),
                reason: "user".into(),
            })
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn event_stream_rejects_unusable_base_url() {
        let backend = HttpBackend::new("not a url", HttpTimeouts::default()).expect("client");
        let err = backend.open_event_stream("c1").await.err().expect("invalid base");
        assert!(matches!(err, BackendError::Transport(ref m) if m.contains("Invalid backend URL")));
    }
}
