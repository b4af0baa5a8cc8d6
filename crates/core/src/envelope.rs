//! Wire envelopes exchanged over the persistent channel.
//!
//! Every frame is a JSON text of the shape `{"type": <string>, "payload": <object>}`.
//! Inbound frames are decoded into [`InboundEnvelope`]; everything the hub
//! pushes out is an [`OutboundEnvelope`].

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{ChatPayload, QuoteRecord};

pub const CHAT_TYPE: &str = "chat";
pub const STOCK_TYPE: &str = "stock";
pub const MARK_SEEN_TYPE: &str = "mark_seen";

/// Why an inbound frame was rejected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Envelope must be a JSON object")]
    NotAnObject,
    #[error("Envelope has no string `type` field")]
    MissingType,
    #[error("Invalid `{kind}` payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

/// A message received from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    Chat(ChatPayload),
    /// Any other type, kept verbatim so it can be relayed unchanged.
    /// A missing or `null` payload is relayed as `{}`.
    Other {
        kind: String,
        payload: Map<String, Value>,
    },
}

impl InboundEnvelope {
    /// Decode a raw text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let (kind, payload) = split_envelope(text)?;
        if kind == CHAT_TYPE {
            let chat: ChatPayload =
                serde_json::from_value(payload).map_err(|e| DecodeError::InvalidPayload {
                    kind: kind.clone(),
                    reason: e.to_string(),
                })?;
            return Ok(Self::Chat(chat));
        }
        match payload {
            Value::Object(map) => Ok(Self::Other { kind, payload: map }),
            Value::Null => Ok(Self::Other {
                kind,
                payload: Map::new(),
            }),
            other => Err(DecodeError::InvalidPayload {
                kind,
                reason: format!("expected an object, got {}", json_kind(&other)),
            }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Chat(_) => CHAT_TYPE,
            Self::Other { kind, .. } => kind,
        }
    }
}

/// A message pushed to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEnvelope {
    Chat(ChatPayload),
    Stock(QuoteRecord),
    Other {
        kind: String,
        payload: Map<String, Value>,
    },
}

impl OutboundEnvelope {
    pub fn kind(&self) -> &str {
        match self {
            Self::Chat(_) => CHAT_TYPE,
            Self::Stock(_) => STOCK_TYPE,
            Self::Other { kind, .. } => kind,
        }
    }

    /// Canonical wire encoding. Byte-stable for a given value.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a frame produced by [`OutboundEnvelope::encode`].
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let (kind, payload) = split_envelope(text)?;
        if kind == STOCK_TYPE {
            let quote: QuoteRecord =
                serde_json::from_value(payload).map_err(|e| DecodeError::InvalidPayload {
                    kind: kind.clone(),
                    reason: e.to_string(),
                })?;
            return Ok(Self::Stock(quote));
        }
        let inbound = InboundEnvelope::decode(text)?;
        Ok(inbound.into())
    }
}

impl From<InboundEnvelope> for OutboundEnvelope {
    fn from(inbound: InboundEnvelope) -> Self {
        match inbound {
            InboundEnvelope::Chat(chat) => Self::Chat(chat),
            InboundEnvelope::Other { kind, payload } => Self::Other { kind, payload },
        }
    }
}

impl Serialize for OutboundEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.kind())?;
        match self {
            Self::Chat(chat) => map.serialize_entry("payload", chat)?,
            Self::Stock(quote) => map.serialize_entry("payload", quote)?,
            Self::Other { payload, .. } => map.serialize_entry("payload", payload)?,
        }
        map.end()
    }
}

fn split_envelope(text: &str) -> Result<(String, Value), DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::NotAnObject);
    };
    let kind = match object.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(DecodeError::MissingType),
    };
    let payload = object.remove("payload").unwrap_or(Value::Null);
    Ok((kind, payload))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SPARK_LEN;
    use serde_json::json;

    #[test]
    fn test_decode_chat() {
        let env =
            InboundEnvelope::decode(r#"{"type":"chat","payload":{"from":"alice","text":"hi"}}"#)
                .unwrap();
        assert_eq!(env, InboundEnvelope::Chat(ChatPayload::new("alice", "hi")));
    }

    #[test]
    fn test_chat_extra_fields_survive_reencode() {
        let text = r#"{"type":"chat","payload":{"from":"alice","text":"hi","time":"10:00:00","id":"c1"}}"#;
        let InboundEnvelope::Chat(chat) = InboundEnvelope::decode(text).unwrap() else {
            panic!("Expected chat envelope");
        };
        assert_eq!(chat.from, "alice");
        assert_eq!(chat.extra.get("time"), Some(&json!("10:00:00")));

        let out = OutboundEnvelope::from(InboundEnvelope::Chat(chat)).encode().unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value["payload"],
            json!({"from": "alice", "text": "hi", "time": "10:00:00", "id": "c1"})
        );
    }

    #[test]
    fn test_decode_missing_payload_is_empty_object() {
        for text in [r#"{"type":"typing"}"#, r#"{"type":"typing","payload":null}"#] {
            match InboundEnvelope::decode(text).unwrap() {
                InboundEnvelope::Other { kind, payload } => {
                    assert_eq!(kind, "typing");
                    assert!(payload.is_empty());
                }
                other => panic!("Expected other envelope, got {:?}", other),
            }
        }
        let out = OutboundEnvelope::decode(r#"{"type":"typing"}"#).unwrap();
        assert_eq!(out.encode().unwrap(), r#"{"type":"typing","payload":{}}"#);
    }

    #[test]
    fn test_decode_other_keeps_payload() {
        let env =
            InboundEnvelope::decode(r#"{"type":"typing","payload":{"from_user":"bob"}}"#).unwrap();
        match env {
            InboundEnvelope::Other { kind, payload } => {
                assert_eq!(kind, "typing");
                assert_eq!(payload.get("from_user"), Some(&json!("bob")));
            }
            _ => panic!("Expected other envelope"),
        }
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            InboundEnvelope::decode("{not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            InboundEnvelope::decode(r#"["chat", {}]"#),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            InboundEnvelope::decode(r#"{"payload":{}}"#),
            Err(DecodeError::MissingType)
        ));
        assert!(matches!(
            InboundEnvelope::decode(r#"{"type":"chat","payload":{"from":"alice"}}"#),
            Err(DecodeError::InvalidPayload { .. })
        ));
        assert!(matches!(
            InboundEnvelope::decode(r#"{"type":"typing","payload":[1,2]}"#),
            Err(DecodeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_encode_chat_wire_shape() {
        let env = OutboundEnvelope::Chat(ChatPayload::new("alice", "hi"));
        let value: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "chat", "payload": {"from": "alice", "text": "hi"}})
        );
    }

    #[test]
    fn test_encode_stock_wire_shape() {
        let quote = QuoteRecord::new("TSLA", 250.0, -5.0, vec![250.0; SPARK_LEN]);
        let env = OutboundEnvelope::Stock(quote.clone());
        let text = env.encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "stock");
        assert_eq!(value["payload"]["symbol"], "TSLA");
        assert_eq!(value["payload"]["percent"], "-2.00");
        assert_eq!(value["payload"]["spark"].as_array().unwrap().len(), SPARK_LEN);

        assert_eq!(OutboundEnvelope::decode(&text).unwrap(), env);
    }

    #[test]
    fn test_encode_is_stable() {
        let env = OutboundEnvelope::Other {
            kind: "typing".to_string(),
            payload: json!({"b": 1, "a": 2}).as_object().cloned().unwrap(),
        };
        assert_eq!(env.encode().unwrap(), env.encode().unwrap());
    }
}
