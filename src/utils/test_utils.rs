//! Scripted in-memory backend for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::api::{
    CallTarget, CancelCallRequest, CloseSessionRequest, GetPromptRequest, OpenSessionRequest,
    ReadResourceRequest, Session, StartCallRequest, StartCallResponse,
};
use crate::core::arguments::ToolDescriptor;
use crate::core::backend::{BackendError, EventFrames, InspectorBackend};

type FrameSender = mpsc::UnboundedSender<Result<String, BackendError>>;
type FrameReceiver = mpsc::UnboundedReceiver<Result<String, BackendError>>;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    OpenSession(CallTarget),
    CloseSession(String),
    StartCall(StartCallRequest),
    CancelCall(CancelCallRequest),
    OpenEventStream(String),
    ListTools(CallTarget),
    ReadResource(String),
    GetPrompt(String),
}

struct EventChannel {
    sender: Option<FrameSender>,
    receiver: Option<FrameReceiver>,
}

impl EventChannel {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Some(sender),
            receiver: Some(receiver),
        }
    }
}

#[derive(Default)]
struct MockState {
    requests: Vec<RecordedRequest>,
    sessions_opened: u64,
    calls_started: u64,
    call_ids: VecDeque<Option<String>>,
    channels: HashMap<String, EventChannel>,
    stream_failures: HashMap<String, String>,
    open_session_error: Option<String>,
    close_session_error: Option<String>,
    start_call_error: Option<String>,
    cancel_error: Option<String>,
    list_tools_error: Option<String>,
    tools: Vec<ToolDescriptor>,
}

impl MockState {
    fn channel(&mut self, call_id: &str) -> &mut EventChannel {
        self.channels
            .entry(call_id.to_string())
            .or_insert_with(EventChannel::new)
    }
}

/// Records every request and serves scripted responses.
///
/// Event frames are queued per call id with [`MockBackend::push_frame`] and
/// may be pushed before or after the stream is opened.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_backend(&self) -> Arc<dyn InspectorBackend> {
        Arc::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn count(&self, predicate: impl Fn(&RecordedRequest) -> bool) -> usize {
        self.lock().requests.iter().filter(|r| predicate(r)).count()
    }

    /// Polls the request log until `predicate` matches, panicking after two
    /// seconds.
    pub async fn wait_for(&self, predicate: impl Fn(&RecordedRequest) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if self.count(&predicate) > 0 {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for request; seen {:?}", self.requests());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Call ids returned by successive `start_call` requests. `None` scripts a
    /// response without an id. Unscripted calls get `call-N`.
    pub fn script_call_ids<I>(&self, ids: I)
    where
        I: IntoIterator<Item = Option<&'static str>>,
    {
        self.lock()
            .call_ids
            .extend(ids.into_iter().map(|id| id.map(str::to_string)));
    }

    pub fn set_tools(&self, tools: Vec<ToolDescriptor>) {
        self.lock().tools = tools;
    }

    pub fn push_frame(&self, call_id: &str, payload: &str) {
        let mut state = self.lock();
        if let Some(sender) = state.channel(call_id).sender.as_ref() {
            let _ = sender.send(Ok(payload.to_string()));
        }
    }

    pub fn push_event(&self, call_id: &str, event: Value) {
        self.push_frame(call_id, &event.to_string());
    }

    /// Fails the open stream of `call_id` mid-flight.
    pub fn break_stream(&self, call_id: &str, message: &str) {
        let mut state = self.lock();
        let channel = state.channel(call_id);
        if let Some(sender) = channel.sender.take() {
            let _ = sender.send(Err(BackendError::Transport(message.to_string())));
        }
    }

    /// Ends the stream of `call_id` after the frames queued so far.
    pub fn end_stream(&self, call_id: &str) {
        self.lock().channel(call_id).sender = None;
    }

    pub fn fail_event_stream(&self, call_id: &str, message: &str) {
        self.lock()
            .stream_failures
            .insert(call_id.to_string(), message.to_string());
    }

    pub fn fail_open_session(&self, message: &str) {
        self.lock().open_session_error = Some(message.to_string());
    }

    pub fn fail_close_session(&self, message: &str) {
        self.lock().close_session_error = Some(message.to_string());
    }

    pub fn fail_start_call(&self, message: &str) {
        self.lock().start_call_error = Some(message.to_string());
    }

    pub fn fail_cancel(&self, message: &str) {
        self.lock().cancel_error = Some(message.to_string());
    }

    pub fn fail_list_tools(&self, message: &str) {
        self.lock().list_tools_error = Some(message.to_string());
    }

    fn rejected(message: &str) -> BackendError {
        BackendError::Status {
            status: 500,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl InspectorBackend for MockBackend {
    async fn open_session(&self, request: &OpenSessionRequest) -> Result<Session, BackendError> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest::OpenSession(request.clone()));
        if let Some(message) = state.open_session_error.as_deref() {
            return Err(Self::rejected(message));
        }
        state.sessions_opened += 1;
        Ok(Session {
            session_id: format!("s-{}", state.sessions_opened),
            server_id: request
                .server_id
                .clone()
                .or_else(|| request.server_name.clone())
                .unwrap_or_default(),
            expires_at_epoch_ms: 0,
        })
    }

    async fn close_session(&self, request: &CloseSessionRequest) -> Result<(), BackendError> {
        let mut state = self.lock();
        state
            .requests
            .push(RecordedRequest::CloseSession(request.session_id.clone()));
        match state.close_session_error.as_deref() {
            Some(message) => Err(Self::rejected(message)),
            None => Ok(()),
        }
    }

    async fn start_call(
        &self,
        request: &StartCallRequest,
    ) -> Result<StartCallResponse, BackendError> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest::StartCall(request.clone()));
        if let Some(message) = state.start_call_error.as_deref() {
            return Err(Self::rejected(message));
        }
        state.calls_started += 1;
        let call_id = match state.call_ids.pop_front() {
            Some(scripted) => scripted,
            None => Some(format!("call-{}", state.calls_started)),
        };
        Ok(StartCallResponse { call_id })
    }

    async fn cancel_call(&self, request: &CancelCallRequest) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest::CancelCall(request.clone()));
        match state.cancel_error.as_deref() {
            Some(message) => Err(Self::rejected(message)),
            None => Ok(()),
        }
    }

    async fn open_event_stream(&self, call_id: &str) -> Result<EventFrames, BackendError> {
        let mut state = self.lock();
        state
            .requests
            .push(RecordedRequest::OpenEventStream(call_id.to_string()));
        if let Some(message) = state.stream_failures.get(call_id) {
            return Err(Self::rejected(message));
        }
        let Some(receiver) = state.channel(call_id).receiver.take() else {
            return Err(BackendError::Transport(format!(
                "event stream for {call_id} already consumed"
            )));
        };

        Ok(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|frame| (frame, receiver))
        })
        .boxed())
    }

    async fn list_tools(&self, target: &CallTarget) -> Result<Vec<ToolDescriptor>, BackendError> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest::ListTools(target.clone()));
        match state.list_tools_error.as_deref() {
            Some(message) => Err(Self::rejected(message)),
            None => Ok(state.tools.clone()),
        }
    }

    async fn read_resource(&self, request: &ReadResourceRequest) -> Result<Value, BackendError> {
        self.lock()
            .requests
            .push(RecordedRequest::ReadResource(request.uri.clone()));
        Ok(json!({"contents": [{"uri": request.uri, "text": "hello"}]}))
    }

    async fn get_prompt(&self, request: &GetPromptRequest) -> Result<Value, BackendError> {
        self.lock()
            .requests
            .push(RecordedRequest::GetPrompt(request.name.clone()));
        Ok(json!({
            "messages": [{"role": "user", "content": {"type": "text", "text": request.name}}]
        }))
    }
}
