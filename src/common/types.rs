use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Một người dùng của backend (thành viên cuộc trò chuyện hoặc ứng viên để chat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Danh tính đã đăng nhập, được lưu xuống máy để khôi phục khi mở lại app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub token: String,
}

impl Session {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Voice,
    File,
}

impl AttachmentKind {
    pub fn from_media_type(media_type: &str) -> Self {
        let media_type = media_type.to_ascii_lowercase();
        if media_type.starts_with("image/") {
            AttachmentKind::Image
        } else if media_type.starts_with("audio/") {
            AttachmentKind::Voice
        } else {
            AttachmentKind::File
        }
    }
}

/// File đã upload thành công, được tham chiếu từ tin nhắn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AttachmentKind>,
    pub url: String,
    #[serde(rename = "originalName", default)]
    pub file_name: String,
    #[serde(rename = "mimeType", default)]
    pub media_type: String,
}

impl Attachment {
    /// Tin nhắn cũ không có `kind`; suy ra từ media type.
    pub fn kind(&self) -> AttachmentKind {
        self.kind
            .unwrap_or_else(|| AttachmentKind::from_media_type(&self.media_type))
    }
}

/// Backend gửi cuộc trò chuyện cha dưới dạng id hoặc object đã populate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRef {
    Id(String),
    Populated(Box<Conversation>),
}

impl ChatRef {
    pub fn id(&self) -> &str {
        match self {
            ChatRef::Id(id) => id,
            ChatRef::Populated(conversation) => &conversation.id,
        }
    }
}

/// Domain model đại diện một tin nhắn chat. Bất biến sau khi tạo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub chat: ChatRef,
    pub sender: UserProfile,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn conversation_id(&self) -> &str {
        self.chat.id()
    }

    /// Đoạn xem trước cho dòng tin nhắn mới nhất trong danh sách.
    pub fn preview(&self) -> String {
        match self.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => match self.attachments.len() {
                0 => String::new(),
                1 => format!("📎 {}", self.attachments[0].file_name),
                n => format!("📎 {n} attachments"),
            },
        }
    }
}

/// Một cuộc trò chuyện (direct hoặc group).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "isGroupChat", default)]
    pub is_group: bool,
    #[serde(rename = "chatName", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(rename = "groupAdmin", default)]
    pub group_admin: Option<UserProfile>,
    #[serde(rename = "latestMessage", default)]
    pub latest_message: Option<Box<ChatMessage>>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: DateTime<Utc>,
    /// Chỉ lưu ở client, không gửi lên hay đọc từ backend.
    #[serde(skip)]
    pub unread: u32,
}

impl Conversation {
    /// Người còn lại (khác `self_id`) trong cuộc trò chuyện direct.
    pub fn other_participant(&self, self_id: &str) -> Option<&UserProfile> {
        if self.is_group {
            return None;
        }
        self.users.iter().find(|user| user.id != self_id)
    }

    pub fn display_name(&self, self_id: &str) -> String {
        if self.is_group {
            return match self.name.as_deref() {
                Some(name) if !name.trim().is_empty() => name.to_string(),
                _ => "Group Chat".to_string(),
            };
        }
        self.other_participant(self_id)
            .map(|user| user.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "Unknown User".to_string())
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.group_admin
            .as_ref()
            .is_some_and(|admin| admin.id == user_id)
    }
}

/// Một người đang gõ trong cuộc trò chuyện đang mở.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingUser {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName", default)]
    pub user_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_accepts_bare_and_populated_chat() {
        let bare: ChatMessage = serde_json::from_value(serde_json::json!({
            "_id": "m1",
            "chat": "c1",
            "sender": { "_id": "u1", "name": "An" },
            "content": "hi",
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(bare.conversation_id(), "c1");

        let populated: ChatMessage = serde_json::from_value(serde_json::json!({
            "_id": "m2",
            "chat": { "_id": "c2", "isGroupChat": true, "chatName": "Team", "users": [] },
            "sender": { "_id": "u1", "name": "An" },
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(populated.conversation_id(), "c2");
        assert!(populated.content.is_none());
        assert!(populated.attachments.is_empty());
    }

    #[test]
    fn attachment_kind_falls_back_to_media_type() {
        let voice = Attachment {
            kind: None,
            url: "/uploads/a.webm".into(),
            file_name: "a.webm".into(),
            media_type: "audio/webm".into(),
        };
        assert_eq!(voice.kind(), AttachmentKind::Voice);
        assert_eq!(
            AttachmentKind::from_media_type("IMAGE/PNG"),
            AttachmentKind::Image
        );
        assert_eq!(
            AttachmentKind::from_media_type("application/pdf"),
            AttachmentKind::File
        );
    }

    #[test]
    fn display_name_rules() {
        let me = UserProfile { id: "me".into(), name: "Me".into(), email: String::new() };
        let other = UserProfile { id: "u2".into(), name: "Binh".into(), email: String::new() };
        let mut direct: Conversation = serde_json::from_value(serde_json::json!({
            "_id": "c1", "isGroupChat": false, "chatName": "sender"
        }))
        .unwrap();
        direct.users = vec![me.clone(), other];
        assert_eq!(direct.display_name("me"), "Binh");

        direct.users = vec![me];
        assert_eq!(direct.display_name("me"), "Unknown User");

        let group: Conversation = serde_json::from_value(serde_json::json!({
            "_id": "g1", "isGroupChat": true, "chatName": "  "
        }))
        .unwrap();
        assert_eq!(group.display_name("me"), "Group Chat");
    }

    #[test]
    fn preview_prefers_text() {
        let mut message: ChatMessage = serde_json::from_value(serde_json::json!({
            "_id": "m1",
            "chat": "c1",
            "sender": { "_id": "u1" },
            "attachments": [{ "url": "/u/x.png", "originalName": "x.png", "mimeType": "image/png" }],
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(message.preview(), "📎 x.png");
        message.content = Some("hello".into());
        assert_eq!(message.preview(), "hello");
    }
}
