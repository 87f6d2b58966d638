//! Decoding of event-feed payloads into a closed set of record variants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RawEvent;
use crate::client::{ClientError, ClientResult};
use crate::stream::ContentKind;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// A decoded feed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRecord {
    /// `message.updated`: message-level metadata.
    MessageUpdated(MessageUpdate),
    /// `message.part.updated`: one fragment's current text or an incremental delta.
    PartUpdated(PartUpdate),
    /// Any other record type; carried by name and otherwise ignored.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageUpdate {
    pub id: String,
    pub role: Role,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartUpdate {
    pub id: String,
    pub message_id: String,
    pub kind: ContentKind,
    /// Full current text of the fragment.
    pub text: String,
    /// Incremental text, when the server sent one. Never empty.
    pub delta: Option<String>,
    pub completed: bool,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    properties: Value,
}

#[derive(Deserialize)]
struct MessageUpdatedProps {
    info: WireMessageInfo,
}

#[derive(Deserialize)]
struct WireMessageInfo {
    id: String,
    role: Role,
    #[serde(default)]
    time: Option<WireMessageTime>,
}

#[derive(Deserialize)]
struct WireMessageTime {
    #[serde(default)]
    completed: Option<Value>,
}

#[derive(Deserialize)]
struct PartUpdatedProps {
    part: WirePart,
    #[serde(default)]
    delta: Option<String>,
}

#[derive(Deserialize)]
struct WirePart {
    id: String,
    #[serde(rename = "messageID")]
    message_id: String,
    #[serde(rename = "type", default)]
    part_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    time: Option<WirePartTime>,
}

#[derive(Deserialize)]
struct WirePartTime {
    #[serde(default)]
    end: Option<Value>,
}

/// Decodes one raw event into a [`FeedRecord`].
///
/// # Errors
/// Returns a parse error for empty data, invalid JSON, or a known record type
/// missing required fields.
pub fn decode(raw: &RawEvent) -> ClientResult<FeedRecord> {
    let data = raw.data.trim();
    if data.is_empty() {
        return Err(ClientError::parse("Empty event data"));
    }

    let envelope: Envelope = serde_json::from_str(data)
        .map_err(|e| ClientError::parse(format!("Failed to parse event type: {e}")))?;

    match envelope.record_type.as_str() {
        "message.updated" => {
            let props: MessageUpdatedProps = serde_json::from_value(envelope.properties)
                .map_err(|e| ClientError::parse(format!("Failed to parse message.updated: {e}")))?;
            let info = props.info;
            Ok(FeedRecord::MessageUpdated(MessageUpdate {
                id: info.id,
                role: info.role,
                completed: info.time.is_some_and(|t| t.completed.is_some()),
            }))
        }
        "message.part.updated" => {
            let props: PartUpdatedProps = serde_json::from_value(envelope.properties)
                .map_err(|e| {
                    ClientError::parse(format!("Failed to parse message.part.updated: {e}"))
                })?;
            let part = props.part;
            let kind = ContentKind::from_part_type(&part.part_type);
            // Tool parts usually carry no text; fall back to the tool name.
            let text = match (part.text, kind) {
                (Some(text), _) if !text.is_empty() => text,
                (_, ContentKind::Tool) => part.tool.unwrap_or_default(),
                (text, _) => text.unwrap_or_default(),
            };
            Ok(FeedRecord::PartUpdated(PartUpdate {
                id: part.id,
                message_id: part.message_id,
                kind,
                text,
                delta: props.delta.filter(|d| !d.is_empty()),
                completed: part.time.is_some_and(|t| t.end.is_some()),
            }))
        }
        other => Ok(FeedRecord::Other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: &Value) -> RawEvent {
        RawEvent::new("message", value.to_string())
    }

    #[test]
    fn test_decode_message_updated() {
        let record = decode(&raw(&json!({
            "type": "message.updated",
            "properties": {"info": {
                "id": "m1", "sessionID": "s1", "role": "assistant",
                "time": {"created": 1.0, "completed": 2.0},
                "tokens": {"input": 100, "output": 5, "reasoning": 0}
            }}
        })))
        .unwrap();

        assert_eq!(
            record,
            FeedRecord::MessageUpdated(MessageUpdate {
                id: "m1".to_string(),
                role: Role::Assistant,
                completed: true,
            })
        );
    }

    #[test]
    fn test_decode_message_without_completion() {
        let record = decode(&raw(&json!({
            "type": "message.updated",
            "properties": {"info": {"id": "m1", "role": "user", "time": {"created": 1.0}}}
        })))
        .unwrap();

        let FeedRecord::MessageUpdated(update) = record else {
            panic!("expected message update");
        };
        assert_eq!(update.role, Role::User);
        assert!(!update.completed);
    }

    #[test]
    fn test_decode_part_with_delta() {
        let record = decode(&raw(&json!({
            "type": "message.part.updated",
            "properties": {
                "part": {"id": "p1", "messageID": "m1", "type": "text", "text": "Hello", "time": {"start": 1}},
                "delta": "lo"
            }
        })))
        .unwrap();

        let FeedRecord::PartUpdated(part) = record else {
            panic!("expected part update");
        };
        assert_eq!(part.kind, ContentKind::Answer);
        assert_eq!(part.text, "Hello");
        assert_eq!(part.delta.as_deref(), Some("lo"));
        assert!(!part.completed);
    }

    #[test]
    fn test_empty_delta_is_treated_as_absent() {
        let record = decode(&raw(&json!({
            "type": "message.part.updated",
            "properties": {
                "part": {"id": "p1", "messageID": "m1", "type": "reasoning", "text": "hmm", "time": {"start": 1, "end": 2}},
                "delta": ""
            }
        })))
        .unwrap();

        let FeedRecord::PartUpdated(part) = record else {
            panic!("expected part update");
        };
        assert_eq!(part.kind, ContentKind::Reasoning);
        assert_eq!(part.delta, None);
        assert!(part.completed);
    }

    #[test]
    fn test_tool_part_falls_back_to_tool_name() {
        let record = decode(&raw(&json!({
            "type": "message.part.updated",
            "properties": {"part": {"id": "p2", "messageID": "m1", "type": "tool", "tool": "bash", "callID": "c1"}}
        })))
        .unwrap();

        let FeedRecord::PartUpdated(part) = record else {
            panic!("expected part update");
        };
        assert_eq!(part.kind, ContentKind::Tool);
        assert_eq!(part.text, "bash");
    }

    #[test]
    fn test_unknown_type_is_other() {
        let record = decode(&raw(&json!({"type": "session.idle", "properties": {}}))).unwrap();
        assert_eq!(record, FeedRecord::Other("session.idle".to_string()));
    }

    #[test]
    fn test_ill_formed_records_are_errors() {
        assert!(decode(&RawEvent::new("message", "")).is_err());
        assert!(decode(&RawEvent::new("message", "{not json")).is_err());
        // Known type with missing fields.
        assert!(decode(&raw(&json!({"type": "message.part.updated", "properties": {}}))).is_err());
        assert!(decode(&raw(&json!({"type": "message.updated"}))).is_err());
    }

    #[test]
    fn test_unknown_role_decodes_as_other() {
        let record = decode(&raw(&json!({
            "type": "message.updated",
            "properties": {"info": {"id": "m9", "role": "system"}}
        })))
        .unwrap();
        let FeedRecord::MessageUpdated(update) = record else {
            panic!("expected message update");
        };
        assert_eq!(update.role, Role::Other);
    }
}
