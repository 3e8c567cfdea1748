use uuid::Uuid;

use super::commands::NetworkCommand;
use super::types::{ChatMessage, Conversation, UserProfile};
use crate::realtime::ServerEvent;

/// Sự kiện realtime được chuyển tới view nào.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeScope {
    Directory,
    Room(String),
}

/// Sự kiện từ tầng mạng gửi lên UI.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    SessionChanged(Option<UserProfile>),
    /// Thông báo không phải lỗi (ví dụ: đăng ký thành công, cần xác minh email).
    Notice(String),
    DirectoryLoaded {
        users: Vec<UserProfile>,
        conversations: Vec<Conversation>,
    },
    ConversationStarted(Conversation),
    GroupUpserted(Conversation),
    HistoryLoaded {
        conversation_id: String,
        messages: Vec<ChatMessage>,
    },
    MessageSent {
        draft_id: Uuid,
        message: ChatMessage,
    },
    SendFailed {
        draft_id: Uuid,
        error: String,
        /// `false` khi chính bản nháp bị từ chối (gửi lại cũng vô ích).
        retryable: bool,
    },
    Realtime {
        scope: RealtimeScope,
        event: ServerEvent,
    },
    RequestFailed {
        message: String,
        retry: Option<NetworkCommand>,
    },
}
