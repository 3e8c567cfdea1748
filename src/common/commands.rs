use uuid::Uuid;

use crate::common::types::Conversation;
use crate::sync::{NewGroup, OutgoingDraft};

/// Lệnh UI gửi xuống tầng mạng.
#[derive(Debug, Clone)]
pub enum NetworkCommand {
    Login {
        email: String,
        password: String,
    },
    Register {
        name: String,
        email: String,
        password: String,
    },
    Logout,
    /// Tải danh sách người dùng và các cuộc trò chuyện.
    LoadDirectory,
    StartDirectChat {
        user_id: String,
    },
    /// Vào phòng của cuộc trò chuyện rồi tải lịch sử tin nhắn.
    OpenConversation(Conversation),
    CloseConversation,
    /// Người dùng vừa gõ phím trong ô soạn tin.
    Keystroke,
    SendMessage {
        draft_id: Uuid,
        draft: OutgoingDraft,
    },
    CreateGroup(NewGroup),
    RenameGroup {
        conversation_id: String,
        name: String,
    },
    AddMember {
        conversation_id: String,
        user_id: String,
    },
    RemoveMember {
        conversation_id: String,
        user_id: String,
    },
}
