//! The inspector panel: session, dispatch, stream and cancellation wired
//! together behind a single owner.

use thiserror::Error;

use crate::core::arguments::ValidationError;
use crate::core::backend::BackendError;
use crate::core::session::SessionError;

mod controller;
mod state;

pub use controller::{CallRequest, InspectorController};
pub use state::{
    ActiveCall, ActivityEntry, ActivitySink, CallPhase, CallProgress, Notification,
    NotificationKind, PanelState,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallStartError {
    #[error("Backend rejected the call: {0}")]
    Rejected(#[source] BackendError),
    #[error("Backend accepted the call without returning a call id")]
    MissingCallId,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cancel request for call {call_id} failed: {source}")]
pub struct CancelError {
    pub call_id: String,
    #[source]
    pub source: BackendError,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InspectorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    CallStart(#[from] CallStartError),
    #[error(transparent)]
    Cancel(#[from] CancelError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
