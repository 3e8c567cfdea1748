//! The slice of Engine.IO v4 / Socket.IO v5 text framing the chat backend uses.
//!
//! Engine.IO prefixes every websocket text frame with a packet type digit;
//! type `4` carries a Socket.IO packet which has its own type digit, so an
//! event looks like `42["typing",{"chatId":"c1"}]`.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Socket.IO CONNECT for the default namespace.
pub const CONNECT: &str = "40";
/// Socket.IO DISCONNECT for the default namespace.
pub const DISCONNECT: &str = "41";
/// Engine.IO PONG, the answer to the server's heartbeat.
pub const PONG: &str = "3";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type `{0}`")]
    UnknownType(String),
    #[error("malformed event packet")]
    MalformedEvent,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Engine.IO OPEN payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Handshake {
    pub sid: String,
    #[serde(rename = "pingInterval", default)]
    pub ping_interval: u64,
    #[serde(rename = "pingTimeout", default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connected,
    Disconnected,
    ConnectError(Value),
    Event { name: String, payload: Value },
    /// Acks and binary packets; the client never requests either.
    Ignored,
}

pub fn decode(frame: &str) -> Result<Packet, CodecError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket(rest),
        '6' => Ok(Packet::Noop),
        other => Err(CodecError::UnknownType(other.to_string())),
    }
}

fn decode_socket(packet: &str) -> Result<Packet, CodecError> {
    let mut chars = packet.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let body = strip_namespace(chars.as_str());
    match kind {
        '0' => Ok(Packet::Connected),
        '1' => Ok(Packet::Disconnected),
        '2' => decode_event(body),
        '3' | '5' | '6' => Ok(Packet::Ignored),
        '4' => Ok(Packet::ConnectError(if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(body)?
        })),
        other => Err(CodecError::UnknownType(format!("4{other}"))),
    }
}

/// Drops a `/namespace,` prefix; the client only talks to `/`.
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(index) => &body[index + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn decode_event(body: &str) -> Result<Packet, CodecError> {
    // Optional ack id before the array.
    let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
    let mut items = match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => items.into_iter(),
        _ => return Err(CodecError::MalformedEvent),
    };
    let name = match items.next() {
        Some(Value::String(name)) => name,
        _ => return Err(CodecError::MalformedEvent),
    };
    let payload = items.next().unwrap_or(Value::Null);
    Ok(Packet::Event { name, payload })
}

pub fn encode_event(name: &str, payload: &Value) -> Result<String, CodecError> {
    let body = serde_json::to_string(&(name, payload))?;
    Ok(format!("42{body}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_engine_packets() {
        let open = decode(r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#)
            .unwrap();
        assert_eq!(
            open,
            Packet::Open(Handshake {
                sid: "lv_VI97HAXpY6yYWAAAC".into(),
                ping_interval: 25000,
                ping_timeout: 20000,
            })
        );
        assert_eq!(decode("2").unwrap(), Packet::Ping);
        assert_eq!(decode("1").unwrap(), Packet::Close);
        assert_eq!(decode(r#"40{"sid":"abc"}"#).unwrap(), Packet::Connected);
        assert_eq!(decode("41").unwrap(), Packet::Disconnected);
        assert!(matches!(decode(""), Err(CodecError::Empty)));
        assert!(matches!(decode("9"), Err(CodecError::UnknownType(_))));
    }

    #[test]
    fn decodes_events_with_ack_and_namespace() {
        let expected = Packet::Event {
            name: "user online".into(),
            payload: json!("u1"),
        };
        assert_eq!(decode(r#"42["user online","u1"]"#).unwrap(), expected);
        assert_eq!(decode(r#"4217["user online","u1"]"#).unwrap(), expected);
        assert_eq!(decode(r#"42/,["user online","u1"]"#).unwrap(), expected);

        assert_eq!(
            decode(r#"42["stop typing"]"#).unwrap(),
            Packet::Event {
                name: "stop typing".into(),
                payload: Value::Null
            }
        );
        assert!(matches!(decode(r#"42{"a":1}"#), Err(CodecError::MalformedEvent)));
        assert!(matches!(decode("42[1,2]"), Err(CodecError::MalformedEvent)));
    }

    #[test]
    fn connect_error_keeps_payload() {
        assert_eq!(
            decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Packet::ConnectError(json!({ "message": "Not authorized" }))
        );
    }

    #[test]
    fn encodes_event_frames() {
        let frame = encode_event("join chat", &json!("c1")).unwrap();
        assert_eq!(frame, r#"42["join chat","c1"]"#);

        let frame = encode_event("typing", &json!({ "chatId": "c1" })).unwrap();
        assert_eq!(decode(&frame).unwrap(), Packet::Event {
            name: "typing".into(),
            payload: json!({ "chatId": "c1" }),
        });
    }
}
