//! The transport-level message shapes from the BiDi wire envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol_error::ErrCode;

/// `Map<String, Value>`, the BiDi command/result payload shape.
pub type JsonMap = serde_json::Map<String, Value>;

/// An outgoing command. Carries no `type` tag on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: JsonMap,
}

/// Anything that can arrive on the inbound side of the channel: a command
/// response (success or error) or a spontaneous event. Events carry no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Success {
        id: u64,
        result: JsonMap,
    },
    Error {
        id: u64,
        error: ErrCode,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stacktrace: Option<String>,
    },
    Event {
        method: String,
        #[serde(default)]
        params: JsonMap,
    },
}

impl InboundMessage {
    /// The command id this message resolves, if any. `None` for events.
    pub fn command_id(&self) -> Option<u64> {
        match self {
            InboundMessage::Success { id, .. } | InboundMessage::Error { id, .. } => Some(*id),
            InboundMessage::Event { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serializes_without_type_tag() {
        let cmd = Command {
            id: 1,
            method: "browsingContext.create".to_string(),
            params: JsonMap::new(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert!(json.get("type").is_none());
        assert_eq!(json["id"], 1);
    }

    #[test]
    fn success_message_round_trips() {
        let raw = r#"{"type":"success","id":7,"result":{"context":"abc"}}"#;
        let msg: InboundMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.command_id(), Some(7));
        match msg {
            InboundMessage::Success { result, .. } => {
                assert_eq!(result["context"], "abc");
            }
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn error_message_parses_closed_error_code() {
        let raw = r#"{"type":"error","id":3,"error":"no such frame","message":"gone"}"#;
        let msg: InboundMessage = serde_json::from_str(raw).unwrap();
        match msg {
            InboundMessage::Error { error, .. } => assert_eq!(error, ErrCode::NoSuchFrame),
            _ => panic!("expected error"),
        }
    }

    #[test]
    fn event_message_has_no_command_id() {
        let raw = r#"{"type":"event","method":"log.entryAdded","params":{}}"#;
        let msg: InboundMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.command_id(), None);
    }
}
