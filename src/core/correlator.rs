//! Maps stream events onto panel transitions.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::api::events::CallEvent;
use crate::core::constants::EVENT_LOG_CAPACITY;

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Started {
        session_id: Option<String>,
    },
    Progress {
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    },
    Log {
        logger: Option<String>,
        level: Option<String>,
        data: Option<Value>,
    },
    Completed {
        result: Value,
        elapsed_ms: u64,
    },
    Failed {
        message: String,
    },
    Cancelled {
        reason: Option<String>,
    },
    /// An event kind this client does not know. Logged, no state change.
    Unrecognized,
}

impl Transition {
    /// Terminal transitions close the subscription and clear the active call.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Transition::Completed { .. } | Transition::Failed { .. } | Transition::Cancelled { .. }
        )
    }
}

/// Decides what an event means for the panel.
///
/// Returns `None` when nothing is active or the event belongs to another
/// call; such events must be neither applied nor logged.
pub fn correlate(
    active_call_id: Option<&str>,
    call_id: &str,
    event: &CallEvent,
) -> Option<Transition> {
    if active_call_id? != call_id {
        return None;
    }

    let transition = match event {
        CallEvent::Started { session_id } => Transition::Started {
            session_id: session_id.clone(),
        },
        CallEvent::Progress {
            progress,
            total,
            message,
        } => Transition::Progress {
            progress: *progress,
            total: *total,
            message: message.clone(),
        },
        CallEvent::Log {
            logger,
            level,
            data,
        } => Transition::Log {
            logger: logger.clone(),
            level: level.clone(),
            data: data.clone(),
        },
        CallEvent::Result { result, elapsed_ms } => Transition::Completed {
            result: result.clone(),
            elapsed_ms: *elapsed_ms,
        },
        CallEvent::Error { message } => Transition::Failed {
            message: if message.trim().is_empty() {
                "Call failed without an error message".to_string()
            } else {
                message.clone()
            },
        },
        CallEvent::Cancelled { reason } => Transition::Cancelled {
            reason: reason.clone(),
        },
        CallEvent::Unknown => Transition::Unrecognized,
    };
    Some(transition)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventLogEntry {
    /// Position among all events accepted since the log was created.
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
    pub call_id: String,
    pub event: CallEvent,
}

/// Bounded history of accepted events for display.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<EventLogEntry>,
    capacity: usize,
    next_sequence: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(EVENT_LOG_CAPACITY)),
            capacity: capacity.max(1),
            next_sequence: 0,
        }
    }

    pub fn push(&mut self, call_id: &str, event: CallEvent) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.next_sequence += 1;
        self.entries.push_back(EventLogEntry {
            sequence: self.next_sequence,
            received_at: Utc::now(),
            call_id: call_id.to_string(),
            event,
        });
    }

    /// Entries accepted after `sequence`, oldest first.
    pub fn since(&self, sequence: u64) -> impl Iterator<Item = &EventLogEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.sequence > sequence)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&EventLogEntry> {
        self.entries.back()
    }
}
