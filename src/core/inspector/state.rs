use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::events::CallEvent;
use crate::core::call_stream::{StreamMessage, SubscriptionHandle};
use crate::core::correlator::{correlate, EventLog, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallPhase {
    #[default]
    Idle,
    Dispatching,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl CallPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            CallPhase::Idle => "idle",
            CallPhase::Dispatching => "dispatching",
            CallPhase::Running => "running",
            CallPhase::Done => "done",
            CallPhase::Failed => "failed",
            CallPhase::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallProgress {
    pub progress: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

/// Operator-facing record of what the panel sent and received.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEntry {
    Request { tool: String, payload: Value },
    Event { call_id: String, event: CallEvent },
    Malformed { call_id: String, error: String },
    CancelRequested { call_id: String, reason: String },
    TransportError { call_id: String, message: String },
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityEntry::Request { tool, payload } => {
                write!(f, "request {tool}: {payload}")
            }
            ActivityEntry::Event { call_id, event } => {
                let body = serde_json::to_string(event).unwrap_or_else(|_| event.kind().into());
                write!(f, "event {call_id}: {body}")
            }
            ActivityEntry::Malformed { call_id, error } => {
                write!(f, "malformed {call_id}: {error}")
            }
            ActivityEntry::CancelRequested { call_id, reason } => {
                write!(f, "cancel {call_id}: {reason}")
            }
            ActivityEntry::TransportError { call_id, message } => {
                write!(f, "transport {call_id}: {message}")
            }
        }
    }
}

pub type ActivitySink = Arc<dyn Fn(&ActivityEntry) + Send + Sync>;

#[derive(Debug)]
pub struct ActiveCall {
    pub call_id: String,
    pub started_at: DateTime<Utc>,
    subscription: Option<SubscriptionHandle>,
}

impl ActiveCall {
    fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|subscription| !subscription.is_closed())
    }
}

/// Observable state of one inspector panel.
///
/// Every mutation goes through this type so the active call, its
/// subscription and the derived flags change together.
#[derive(Default)]
pub struct PanelState {
    phase: CallPhase,
    submitting: bool,
    cancelling: bool,
    active: Option<ActiveCall>,
    last_call_id: Option<String>,
    result: Option<Value>,
    elapsed_ms: Option<u64>,
    error: Option<String>,
    progress: Option<CallProgress>,
    events: EventLog,
    notifications: VecDeque<Notification>,
    activity: Option<ActivitySink>,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancelling
    }

    pub fn active_call_id(&self) -> Option<&str> {
        self.active.as_ref().map(|call| call.call_id.as_str())
    }

    pub fn active_call(&self) -> Option<&ActiveCall> {
        self.active.as_ref()
    }

    /// Id of the most recently adopted call, kept after it finishes.
    pub fn last_call_id(&self) -> Option<&str> {
        self.last_call_id.as_deref()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn elapsed_ms(&self) -> Option<u64> {
        self.elapsed_ms
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn progress(&self) -> Option<&CallProgress> {
        self.progress.as_ref()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    pub fn set_activity_sink(&mut self, sink: Option<ActivitySink>) {
        self.activity = sink;
    }

    pub(crate) fn record_activity(&self, entry: ActivityEntry) {
        if let Some(sink) = self.activity.as_ref() {
            sink(&entry);
        }
    }

    pub(crate) fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            NotificationKind::Error | NotificationKind::Warning => warn!("{message}"),
            NotificationKind::Info | NotificationKind::Success => info!("{message}"),
        }
        self.notifications.push_back(Notification { kind, message });
    }

    /// Detaches any previous call and resets per-call state for a new
    /// dispatch. The previous call is not cancelled on the backend.
    pub(crate) fn begin_dispatch(&mut self) {
        if let Some(mut previous) = self.active.take() {
            previous.detach();
            self.notify(
                NotificationKind::Info,
                format!(
                    "Stopped following call {}; it was not cancelled",
                    previous.call_id
                ),
            );
        }
        self.phase = CallPhase::Dispatching;
        self.submitting = true;
        self.cancelling = false;
        self.result = None;
        self.elapsed_ms = None;
        self.error = None;
        self.progress = None;
        self.events.clear();
    }

    pub(crate) fn adopt_call(&mut self, call_id: String, subscription: SubscriptionHandle) {
        self.last_call_id = Some(call_id.clone());
        self.active = Some(ActiveCall {
            call_id,
            started_at: Utc::now(),
            subscription: Some(subscription),
        });
    }

    pub(crate) fn dispatch_failed(&mut self, message: String) {
        self.phase = CallPhase::Idle;
        self.submitting = false;
        self.error = Some(message.clone());
        self.notify(NotificationKind::Error, message);
    }

    /// Applies one message from a subscription. Messages for any call other
    /// than the active one are dropped without a trace.
    pub(crate) fn apply_stream_message(&mut self, message: StreamMessage, call_id: &str) {
        match message {
            StreamMessage::Event(event) => {
                let Some(transition) = correlate(self.active_call_id(), call_id, &event) else {
                    debug!(
                        call_id = %call_id,
                        kind = event.kind(),
                        "Dropping event for inactive call"
                    );
                    return;
                };
                self.events.push(call_id, event.clone());
                self.record_activity(ActivityEntry::Event {
                    call_id: call_id.to_string(),
                    event,
                });
                self.apply_transition(call_id, transition);
            }
            StreamMessage::Malformed { payload, error } => {
                if self.active_call_id() != Some(call_id) {
                    return;
                }
                debug!(call_id = %call_id, payload = %payload, "Malformed event skipped");
                self.record_activity(ActivityEntry::Malformed {
                    call_id: call_id.to_string(),
                    error,
                });
            }
            StreamMessage::TransportError(message) => {
                if self.active_call_id() != Some(call_id) {
                    return;
                }
                self.record_activity(ActivityEntry::TransportError {
                    call_id: call_id.to_string(),
                    message: message.clone(),
                });
                self.finish_call(CallPhase::Idle);
                self.error = Some(message.clone());
                self.notify(
                    NotificationKind::Error,
                    format!("Lost event stream for call {call_id}: {message}"),
                );
            }
        }
    }

    fn apply_transition(&mut self, call_id: &str, transition: Transition) {
        if self.phase == CallPhase::Dispatching {
            self.phase = CallPhase::Running;
        }

        match transition {
            Transition::Started { session_id } => {
                debug!(call_id = %call_id, session_id = ?session_id, "Call started");
            }
            Transition::Progress {
                progress,
                total,
                message,
            } => {
                self.progress = Some(CallProgress {
                    progress,
                    total,
                    message,
                });
            }
            Transition::Log { .. } | Transition::Unrecognized => {}
            Transition::Completed { result, elapsed_ms } => {
                self.result = Some(result);
                self.elapsed_ms = Some(elapsed_ms);
                self.finish_call(CallPhase::Done);
                self.notify(
                    NotificationKind::Success,
                    format!("Call {call_id} completed in {elapsed_ms} ms"),
                );
            }
            Transition::Failed { message } => {
                self.error = Some(message.clone());
                self.finish_call(CallPhase::Failed);
                self.notify(
                    NotificationKind::Error,
                    format!("Call {call_id} failed: {message}"),
                );
            }
            Transition::Cancelled { reason } => {
                self.finish_call(CallPhase::Cancelled);
                let message = match reason {
                    Some(reason) if !reason.trim().is_empty() => {
                        format!("Call {call_id} cancelled: {reason}")
                    }
                    _ => format!("Call {call_id} cancelled"),
                };
                self.notify(NotificationKind::Warning, message);
            }
        }
    }

    /// Closes the subscription and clears the active call in one step.
    fn finish_call(&mut self, phase: CallPhase) {
        if let Some(mut call) = self.active.take() {
            call.detach();
        }
        self.phase = phase;
        self.submitting = false;
        self.cancelling = false;
    }

    /// Forced reset to idle without a notification.
    pub(crate) fn teardown(&mut self) {
        if let Some(call) = self.active.as_ref() {
            debug!(call_id = %call.call_id, "Tearing down active call");
        }
        self.finish_call(CallPhase::Idle);
    }

    /// Marks the active call as cancelling and returns its id.
    pub(crate) fn begin_cancel(&mut self) -> Option<String> {
        let call_id = self.active_call_id()?.to_string();
        self.cancelling = true;
        Some(call_id)
    }

    pub(crate) fn cancel_rejected(&mut self, call_id: &str, message: String) {
        if self.active_call_id() == Some(call_id) {
            self.cancelling = false;
        }
        self.notify(
            NotificationKind::Error,
            format!("Cancel request for call {call_id} failed: {message}"),
        );
    }
}
