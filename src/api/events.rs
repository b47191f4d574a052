//! Event records delivered on a call's event stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event emitted by the backend for a running call.
///
/// Kinds the client does not know about deserialize to [`CallEvent::Unknown`]
/// so a newer backend vocabulary never breaks an older client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallEvent {
    Started {
        #[serde(default)]
        session_id: Option<String>,
    },
    Progress {
        #[serde(default)]
        progress: f64,
        #[serde(default)]
        total: Option<f64>,
        #[serde(default)]
        message: Option<String>,
    },
    Log {
        #[serde(default)]
        logger: Option<String>,
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        data: Option<Value>,
    },
    Result {
        #[serde(default)]
        result: Value,
        #[serde(default)]
        elapsed_ms: u64,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    Cancelled {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl CallEvent {
    /// `result`, `error` and `cancelled` end a call's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallEvent::Result { .. } | CallEvent::Error { .. } | CallEvent::Cancelled { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CallEvent::Started { .. } => "started",
            CallEvent::Progress { .. } => "progress",
            CallEvent::Log { .. } => "log",
            CallEvent::Result { .. } => "result",
            CallEvent::Error { .. } => "error",
            CallEvent::Cancelled { .. } => "cancelled",
            CallEvent::Unknown => "unknown",
        }
    }
}

/// Wire framing of an event: the optional `call_id` sits next to the
/// `event` discriminator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(flatten)]
    pub event: CallEvent,
}

/// Decodes one text frame. Events without an explicit `call_id` belong to
/// the subscription they arrived on.
pub fn parse_event_payload(
    payload: &str,
    subscription_call_id: &str,
) -> Result<(String, CallEvent), serde_json::Error> {
    let envelope = serde_json::from_str::<EventEnvelope>(payload)?;
    let call_id = envelope
        .call_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| subscription_call_id.to_string());
    Ok((call_id, envelope.event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_known_event_kind() {
        let cases = [
            (r#"{"event":"started","session_id":"s-1"}"#, "started"),
            (r#"{"event":"progress","progress":1,"total":3}"#, "progress"),
            (r#"{"event":"log","level":"info","data":"hello"}"#, "log"),
            (r#"{"event":"result","result":{"ok":true},"elapsed_ms":120}"#, "result"),
            (r#"{"event":"error","message":"boom"}"#, "error"),
            (r#"{"event":"cancelled","reason":"user"}"#, "cancelled"),
        ];

        for (payload, kind) in cases {
            let (call_id, event) = parse_event_payload(payload, "c1")
                .unwrap_or_else(|err| panic!("payload {payload} should parse: {err}"));
            assert_eq!(call_id, "c1");
            assert_eq!(event.kind(), kind);
        }
    }

    #[test]
    fn progress_accepts_integer_counts() {
        let (_, event) =
            parse_event_payload(r#"{"event":"progress","progress":3,"total":3}"#, "c1")
                .expect("parse");
        assert_eq!(
            event,
            CallEvent::Progress {
                progress: 3.0,
                total: Some(3.0),
                message: None,
            }
        );
    }

    #[test]
    fn explicit_call_id_overrides_subscription() {
        let (call_id, event) =
            parse_event_payload(r#"{"event":"log","call_id":"c9","data":[1,2]}"#, "c1")
                .expect("parse");
        assert_eq!(call_id, "c9");
        assert_eq!(
            event,
            CallEvent::Log {
                logger: None,
                level: None,
                data: Some(json!([1, 2])),
            }
        );
    }

    #[test]
    fn unknown_kinds_fail_soft() {
        let (_, event) =
            parse_event_payload(r#"{"event":"heartbeat","at":12}"#, "c1").expect("parse");
        assert_eq!(event, CallEvent::Unknown);
        assert!(!event.is_terminal());
    }

    #[test]
    fn missing_discriminator_is_an_error() {
        assert!(parse_event_payload(r#"{"progress":1}"#, "c1").is_err());
        assert!(parse_event_payload("not json", "c1").is_err());
    }

    #[test]
    fn terminal_kinds() {
        assert!(CallEvent::Result {
            result: json!(null),
            elapsed_ms: 0
        }
        .is_terminal());
        assert!(CallEvent::Error {
            message: "x".into()
        }
        .is_terminal());
        assert!(CallEvent::Cancelled { reason: None }.is_terminal());
        assert!(!CallEvent::Started { session_id: None }.is_terminal());
    }
}
