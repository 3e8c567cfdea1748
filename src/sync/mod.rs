//! Client-side synchronization: the state machines that sit between the
//! REST/realtime plumbing and what the UI renders.

pub mod auth;
pub mod conversation_list;
pub mod conversation_view;
pub mod groups;
pub mod outgoing;
pub mod room;
pub mod typing;

pub use auth::{validate_login, validate_registration};
pub use conversation_list::{ConversationList, recency_label};
pub use conversation_view::{ConversationView, message_time_label};
pub use groups::NewGroup;
pub use outgoing::{
    ChatBackend, EventSink, MAX_ATTACHMENT_BYTES, NewMessage, OutgoingDraft, PendingFile, deliver,
};
pub use room::RoomMembership;
pub use typing::TypingDebouncer;
