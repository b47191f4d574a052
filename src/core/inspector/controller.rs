use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::state::{ActivityEntry, ActivitySink, CallPhase, NotificationKind, PanelState};
use super::{CallStartError, CancelError, InspectorError};
use crate::api::{
    CallTarget, CancelCallRequest, CapabilityKind, GetPromptRequest, ReadResourceRequest, Session,
    StartCallRequest,
};
use crate::core::arguments::{resolve_arguments, ArgumentInput, ToolDescriptor};
use crate::core::backend::InspectorBackend;
use crate::core::call_stream::{CallStreamService, TaggedStreamMessage};
use crate::core::constants::DEFAULT_TIMEOUT_MS;
use crate::core::session::{SessionError, SessionManager};

/// Everything needed to dispatch one tool invocation.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub tool: ToolDescriptor,
    pub target: CallTarget,
    pub arguments: ArgumentInput,
    pub timeout_ms: u64,
}

impl CallRequest {
    pub fn new(tool: ToolDescriptor, target: CallTarget) -> Self {
        Self {
            tool,
            target,
            arguments: ArgumentInput::Empty,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_arguments(mut self, arguments: ArgumentInput) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Single owner of one panel's session, active call and subscription.
///
/// Stream readers only forward tagged messages; every state change happens
/// here through `&mut self`. Dropping the controller tears the panel down.
pub struct InspectorController {
    backend: Arc<dyn InspectorBackend>,
    sessions: SessionManager,
    streams: CallStreamService,
    stream_rx: mpsc::UnboundedReceiver<TaggedStreamMessage>,
    panel: PanelState,
}

impl InspectorController {
    pub fn new(backend: Arc<dyn InspectorBackend>) -> Self {
        let (streams, stream_rx) = CallStreamService::new(Arc::clone(&backend));
        Self {
            backend,
            sessions: SessionManager::new(),
            streams,
            stream_rx,
            panel: PanelState::new(),
        }
    }

    pub fn with_activity_sink(mut self, sink: ActivitySink) -> Self {
        self.panel.set_activity_sink(Some(sink));
        self
    }

    pub fn panel(&self) -> &PanelState {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut PanelState {
        &mut self.panel
    }

    pub fn session(&self) -> Option<&Session> {
        self.sessions.current()
    }

    /// Reacts to the operator picking a capability or server: any running
    /// call is dropped and a session is ensured for tool mode.
    pub async fn select(
        &mut self,
        kind: CapabilityKind,
        target: &CallTarget,
    ) -> Result<Option<Session>, InspectorError> {
        self.panel.teardown();
        self.ensure_session(kind, target).await
    }

    /// Ensures the session `kind` needs for `target`. A change that releases
    /// or replaces the held session also drops the active call.
    pub async fn ensure_session(
        &mut self,
        kind: CapabilityKind,
        target: &CallTarget,
    ) -> Result<Option<Session>, InspectorError> {
        let session_changes = self.sessions.current().is_some()
            && (!kind.requires_session() || self.sessions.session_for(target).is_none());
        if session_changes {
            self.panel.teardown();
        }

        match self.sessions.ensure_session(&self.backend, kind, target).await {
            Ok(session) => Ok(session),
            Err(err) => {
                self.panel.notify(NotificationKind::Error, err.to_string());
                Err(err.into())
            }
        }
    }

    /// Validates arguments, starts the call and subscribes to its events.
    ///
    /// A previous call is detached without a cancel request. On any failure
    /// the panel carries a notification and no call is active.
    pub async fn start_call(&mut self, request: CallRequest) -> Result<String, InspectorError> {
        let arguments = match resolve_arguments(&request.tool, &request.arguments) {
            Ok(arguments) => arguments,
            Err(err) => {
                self.panel.notify(NotificationKind::Error, err.to_string());
                return Err(err.into());
            }
        };

        let session_id = match self.sessions.session_for(&request.target) {
            Some(session) => Some(session.session_id.clone()),
            None => {
                let err = SessionError::Missing(request.target.label());
                self.panel.notify(NotificationKind::Error, err.to_string());
                return Err(err.into());
            }
        };

        self.panel.begin_dispatch();
        let start = build_start_request(&request, arguments, session_id);
        self.panel.record_activity(ActivityEntry::Request {
            tool: start.tool.clone(),
            payload: serde_json::to_value(&start).unwrap_or(Value::Null),
        });

        let call_id = match self.backend.start_call(&start).await {
            Ok(response) => response.call_id.filter(|id| !id.trim().is_empty()),
            Err(err) => {
                let err = CallStartError::Rejected(err);
                self.panel.dispatch_failed(err.to_string());
                return Err(err.into());
            }
        };
        let Some(call_id) = call_id else {
            let err = CallStartError::MissingCallId;
            self.panel.dispatch_failed(err.to_string());
            return Err(err.into());
        };

        info!(
            call_id = %call_id,
            tool = %start.tool,
            target = %request.target.label(),
            "Call started"
        );
        let subscription = self.streams.subscribe(&call_id);
        self.panel.adopt_call(call_id.clone(), subscription);
        Ok(call_id)
    }

    /// Asks the backend to cancel the active call.
    ///
    /// Returns `Ok(false)` when nothing is active. The call stays running
    /// until the stream delivers its terminal event.
    pub async fn cancel(&mut self, reason: &str) -> Result<bool, InspectorError> {
        let Some(call_id) = self.panel.begin_cancel() else {
            return Ok(false);
        };

        self.panel.record_activity(ActivityEntry::CancelRequested {
            call_id: call_id.clone(),
            reason: reason.to_string(),
        });
        let request = CancelCallRequest {
            call_id: call_id.clone(),
            reason: reason.to_string(),
        };
        match self.backend.cancel_call(&request).await {
            Ok(()) => {
                debug!(call_id = %call_id, "Cancel request accepted");
                Ok(true)
            }
            Err(source) => {
                self.panel.cancel_rejected(&call_id, source.to_string());
                Err(CancelError { call_id, source }.into())
            }
        }
    }

    /// Waits for the next stream message and applies it. Returns `false`
    /// once no subscription can deliver anything more.
    pub async fn next_update(&mut self) -> bool {
        match self.stream_rx.recv().await {
            Some((message, call_id)) => {
                self.panel.apply_stream_message(message, &call_id);
                true
            }
            None => false,
        }
    }

    /// Applies every message already queued without waiting.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((message, call_id)) = self.stream_rx.try_recv() {
            self.panel.apply_stream_message(message, &call_id);
            applied += 1;
        }
        applied
    }

    /// Drives the active call until it leaves the panel.
    pub async fn run_to_completion(&mut self) -> CallPhase {
        while self.panel.active_call_id().is_some() {
            if !self.next_update().await {
                break;
            }
        }
        self.panel.phase()
    }

    pub async fn list_tools(
        &self,
        target: &CallTarget,
    ) -> Result<Vec<ToolDescriptor>, InspectorError> {
        Ok(self.backend.list_tools(target).await?)
    }

    pub async fn read_resource(
        &self,
        target: &CallTarget,
        uri: &str,
    ) -> Result<Value, InspectorError> {
        let request = ReadResourceRequest {
            uri: uri.to_string(),
            target: target.clone(),
        };
        Ok(self.backend.read_resource(&request).await?)
    }

    pub async fn get_prompt(
        &self,
        target: &CallTarget,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<Value, InspectorError> {
        let request = GetPromptRequest {
            name: name.to_string(),
            arguments,
            target: target.clone(),
        };
        Ok(self.backend.get_prompt(&request).await?)
    }

    /// Ends the panel and waits for the session close, for drivers that are
    /// about to exit.
    pub async fn shutdown(mut self) -> Result<(), InspectorError> {
        self.panel.teardown();
        self.sessions.close(&self.backend).await?;
        Ok(())
    }

    /// Stops following the active call without cancelling it. The session
    /// stays open.
    pub fn stop_following(&mut self) {
        self.panel.teardown();
    }

    /// Drops the active call and releases the session without waiting.
    pub fn close_panel(&mut self) {
        self.panel.teardown();
        self.sessions.teardown(&self.backend);
    }
}

impl Drop for InspectorController {
    fn drop(&mut self) {
        self.close_panel();
    }
}

fn build_start_request(
    request: &CallRequest,
    arguments: Option<Map<String, Value>>,
    session_id: Option<String>,
) -> StartCallRequest {
    StartCallRequest {
        tool: request.tool.name.clone(),
        server_id: request.target.server_id.clone(),
        server_name: request.target.server_name.clone(),
        mode: request.target.mode,
        arguments,
        timeout_ms: request.timeout_ms,
        session_id,
    }
}
