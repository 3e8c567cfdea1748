pub mod commands;
pub mod error;
pub mod events;
pub mod types;

pub use commands::NetworkCommand;
pub use error::{ClientError, ClientResult};
pub use events::{NetworkEvent, RealtimeScope};
pub use types::{
    Attachment, AttachmentKind, ChatMessage, ChatRef, Conversation, Session, TypingUser,
    UserProfile,
};
