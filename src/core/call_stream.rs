//! Event-stream subscriptions for running calls.
//!
//! Each subscription runs on its own task and forwards decoded messages,
//! tagged with the call id they belong to, into one channel owned by the
//! inspector controller. Nothing here touches panel state.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::events::{parse_event_payload, CallEvent};
use crate::core::backend::InspectorBackend;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Event(CallEvent),
    /// A frame that could not be decoded. The stream stays open.
    Malformed { payload: String, error: String },
    /// The connection failed or ended before a terminal event.
    TransportError(String),
}

/// Owned handle to one open subscription.
///
/// Closing is idempotent and also happens on drop, so a handle that goes out
/// of scope on any path releases its connection.
#[derive(Debug)]
pub struct SubscriptionHandle {
    call_id: String,
    cancel_token: CancellationToken,
}

impl SubscriptionHandle {
    fn new(call_id: String, cancel_token: CancellationToken) -> Self {
        Self {
            call_id,
            cancel_token,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn close(&self) {
        if !self.cancel_token.is_cancelled() {
            debug!(call_id = %self.call_id, "Closing call event stream");
            self.cancel_token.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

pub type TaggedStreamMessage = (StreamMessage, String);

#[derive(Clone)]
pub struct CallStreamService {
    backend: Arc<dyn InspectorBackend>,
    tx: mpsc::UnboundedSender<TaggedStreamMessage>,
}

impl CallStreamService {
    pub fn new(
        backend: Arc<dyn InspectorBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<TaggedStreamMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { backend, tx }, rx)
    }

    /// Opens the event stream for `call_id` on a new task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(&self, call_id: &str) -> SubscriptionHandle {
        let cancel_token = CancellationToken::new();
        let handle = SubscriptionHandle::new(call_id.to_string(), cancel_token.clone());

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let call_id = call_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = pump_call_events(backend, call_id.clone(), tx) => {}
                _ = cancel_token.cancelled() => {
                    debug!(call_id = %call_id, "Event stream task stopped by close");
                }
            }
        });

        handle
    }
}

async fn pump_call_events(
    backend: Arc<dyn InspectorBackend>,
    call_id: String,
    tx: mpsc::UnboundedSender<TaggedStreamMessage>,
) {
    let mut frames = match backend.open_event_stream(&call_id).await {
        Ok(frames) => frames,
        Err(err) => {
            let _ = tx.send((StreamMessage::TransportError(err.to_string()), call_id));
            return;
        }
    };

    while let Some(frame) = frames.next().await {
        let payload = match frame {
            Ok(payload) => payload,
            Err(err) => {
                let _ = tx.send((StreamMessage::TransportError(err.to_string()), call_id));
                return;
            }
        };

        match parse_event_payload(&payload, &call_id) {
            Ok((event_call_id, event)) => {
                let ends_subscription = event.is_terminal() && event_call_id == call_id;
                if tx.send((StreamMessage::Event(event), event_call_id)).is_err() {
                    return;
                }
                if ends_subscription {
                    return;
                }
            }
            Err(err) => {
                warn!(call_id = %call_id, "Skipping malformed call event: {err}");
                let _ = tx.send((
                    StreamMessage::Malformed {
                        payload,
                        error: err.to_string(),
                    },
                    call_id.clone(),
                ));
            }
        }
    }

    let _ = tx.send((
        StreamMessage::TransportError("event stream closed before the call finished".to_string()),
        call_id,
    ));
}
