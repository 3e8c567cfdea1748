//! Closed set of realtime events. Wire names live only in the `match`es below,
//! so adding a variant without a name does not compile.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{ChatMessage, UserProfile};

/// Inbound event kinds; the key handlers are registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageReceived,
    Typing,
    StopTyping,
    UserOnline,
    UserOffline,
}

impl EventKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::MessageReceived => "message received",
            EventKind::Typing => "typing",
            EventKind::StopTyping => "stop typing",
            EventKind::UserOnline => "user online",
            EventKind::UserOffline => "user offline",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "message received" => Some(EventKind::MessageReceived),
            "typing" => Some(EventKind::Typing),
            "stop typing" => Some(EventKind::StopTyping),
            "user online" => Some(EventKind::UserOnline),
            "user offline" => Some(EventKind::UserOffline),
            _ => None,
        }
    }
}

/// Payload of inbound `typing` / `stop typing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingSignal {
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(rename = "userName", default)]
    pub user_name: Option<String>,
    /// Only some backends include it; events are room-scoped anyway.
    #[serde(rename = "chatId", default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ServerEvent {
    MessageReceived(ChatMessage),
    Typing(TypingSignal),
    StopTyping(TypingSignal),
    UserOnline(String),
    UserOffline(String),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::MessageReceived(_) => EventKind::MessageReceived,
            ServerEvent::Typing(_) => EventKind::Typing,
            ServerEvent::StopTyping(_) => EventKind::StopTyping,
            ServerEvent::UserOnline(_) => EventKind::UserOnline,
            ServerEvent::UserOffline(_) => EventKind::UserOffline,
        }
    }

    /// `Ok(None)` for event names this client does not handle.
    pub fn decode(name: &str, payload: Value) -> serde_json::Result<Option<Self>> {
        let Some(kind) = EventKind::from_wire(name) else {
            return Ok(None);
        };
        let event = match kind {
            EventKind::MessageReceived => ServerEvent::MessageReceived(serde_json::from_value(payload)?),
            EventKind::Typing => ServerEvent::Typing(serde_json::from_value(payload)?),
            EventKind::StopTyping => ServerEvent::StopTyping(serde_json::from_value(payload)?),
            EventKind::UserOnline => ServerEvent::UserOnline(user_id(payload)?),
            EventKind::UserOffline => ServerEvent::UserOffline(user_id(payload)?),
        };
        Ok(Some(event))
    }
}

/// Presence events carry either a bare id or a user object.
fn user_id(payload: Value) -> serde_json::Result<String> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Presence {
        Id(String),
        User {
            #[serde(alias = "_id")]
            #[serde(rename = "userId")]
            id: String,
        },
    }
    serde_json::from_value::<Presence>(payload).map(|presence| match presence {
        Presence::Id(id) | Presence::User { id } => id,
    })
}

/// Outbound `typing` / `stop typing` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingNotice {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Announces the identity once per connection.
    Setup(UserProfile),
    JoinChat(String),
    LeaveChat(String),
    /// A freshly created message with its conversation populated.
    NewMessage(ChatMessage),
    Typing(TypingNotice),
    StopTyping(TypingNotice),
}

impl ClientEvent {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ClientEvent::Setup(_) => "setup",
            ClientEvent::JoinChat(_) => "join chat",
            ClientEvent::LeaveChat(_) => "leave chat",
            ClientEvent::NewMessage(_) => "new message",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::StopTyping(_) => "stop typing",
        }
    }

    pub fn payload(&self) -> serde_json::Result<Value> {
        match self {
            ClientEvent::Setup(user) => serde_json::to_value(user),
            ClientEvent::JoinChat(id) | ClientEvent::LeaveChat(id) => Ok(Value::String(id.clone())),
            ClientEvent::NewMessage(message) => serde_json::to_value(message),
            ClientEvent::Typing(notice) | ClientEvent::StopTyping(notice) => {
                serde_json::to_value(notice)
            }
        }
    }
}
