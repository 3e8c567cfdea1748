//! Outgoing messages: draft validation, attachment upload, creation and the
//! realtime broadcast to the other participants.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::{Attachment, ChatMessage, ChatRef, ClientError, ClientResult, Conversation};
use crate::realtime::ClientEvent;

/// Files above this size are rejected before anything is uploaded.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub file_name: String,
    pub media_type: String,
    pub size: u64,
}

impl PendingFile {
    pub fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(ClientError::validation(format!(
                "{} is not a file",
                path.display()
            )));
        }
        let file = Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string()),
            media_type: guess_media_type(path).to_string(),
            size: metadata.len(),
        };
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.size > MAX_ATTACHMENT_BYTES {
            return Err(ClientError::validation(format!(
                "{} is larger than 10MB",
                self.file_name
            )));
        }
        Ok(())
    }
}

fn guess_media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "webm" => "audio/webm",
        "ogg" | "oga" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// What the compose box submits. Kept intact on failure so the user can retry.
#[derive(Debug, Clone)]
pub struct OutgoingDraft {
    pub conversation: Conversation,
    pub text: String,
    pub files: Vec<PendingFile>,
}

impl OutgoingDraft {
    pub fn validate(&self) -> ClientResult<()> {
        if self.text.trim().is_empty() && self.files.is_empty() {
            return Err(ClientError::validation("Message is empty"));
        }
        self.files.iter().try_for_each(PendingFile::validate)
    }
}

/// Body of `POST /message`.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// REST operations a send needs.
pub trait ChatBackend {
    async fn upload(&self, files: &[PendingFile]) -> ClientResult<Vec<Attachment>>;
    async fn post_message(&self, message: &NewMessage) -> ClientResult<ChatMessage>;
}

/// Anything realtime events can be pushed into.
pub trait EventSink {
    fn emit(&self, event: ClientEvent);
}

/// No live channel: events are dropped, the REST path still works.
impl<S: EventSink> EventSink for Option<S> {
    fn emit(&self, event: ClientEvent) {
        match self {
            Some(sink) => sink.emit(event),
            None => log::debug!("Realtime unavailable; dropping `{}`", event.wire_name()),
        }
    }
}

/// Validate → upload → create → broadcast. The caller appends the returned
/// message to its local view.
pub async fn deliver<B, S>(backend: &B, sink: &S, draft: &OutgoingDraft) -> ClientResult<ChatMessage>
where
    B: ChatBackend,
    S: EventSink,
{
    draft.validate()?;

    let attachments = if draft.files.is_empty() {
        Vec::new()
    } else {
        backend.upload(&draft.files).await?
    };

    let text = draft.text.trim();
    let request = NewMessage {
        chat_id: draft.conversation.id.clone(),
        content: (!text.is_empty()).then(|| text.to_string()),
        attachments,
    };
    let message = backend.post_message(&request).await?;

    // Other participants' clients route by the populated conversation.
    let mut broadcast = message.clone();
    broadcast.chat = ChatRef::Populated(Box::new(draft.conversation.clone()));
    sink.emit(ClientEvent::NewMessage(broadcast));

    Ok(message)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::common::UserProfile;
    use crate::sync::ConversationView;

    struct FakeBackend {
        me: UserProfile,
        uploads: AtomicUsize,
        fail_upload: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                me: UserProfile {
                    id: "me".into(),
                    name: "Me".into(),
                    email: "me@example.com".into(),
                },
                uploads: AtomicUsize::new(0),
                fail_upload: false,
            }
        }
    }

    impl ChatBackend for FakeBackend {
        async fn upload(&self, files: &[PendingFile]) -> ClientResult<Vec<Attachment>> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload {
                return Err(ClientError::Api {
                    status: Some(500),
                    message: Some("Upload failed".into()),
                });
            }
            Ok(files
                .iter()
                .map(|file| Attachment {
                    kind: None,
                    url: format!("/uploads/{}", file.file_name),
                    file_name: file.file_name.clone(),
                    media_type: file.media_type.clone(),
                })
                .collect())
        }

        async fn post_message(&self, message: &NewMessage) -> ClientResult<ChatMessage> {
            Ok(ChatMessage {
                id: "m-1".into(),
                chat: ChatRef::Id(message.chat_id.clone()),
                sender: self.me.clone(),
                content: message.content.clone(),
                attachments: message.attachments.clone(),
                created_at: Utc::now(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<ClientEvent>>);

    impl EventSink for RecordingSink {
        fn emit(&self, event: ClientEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn conversation(id: &str) -> Conversation {
        serde_json::from_value(serde_json::json!({ "_id": id, "isGroupChat": false })).unwrap()
    }

    fn file(name: &str, size: u64) -> PendingFile {
        PendingFile {
            path: PathBuf::from(name),
            file_name: name.into(),
            media_type: "application/octet-stream".into(),
            size,
        }
    }

    #[tokio::test]
    async fn send_hello_appends_once_and_broadcasts() {
        let backend = FakeBackend::new();
        let sink = RecordingSink::default();
        let draft = OutgoingDraft {
            conversation: conversation("C123"),
            text: "hello".into(),
            files: Vec::new(),
        };

        let message = deliver(&backend, &sink, &draft).await.unwrap();
        let mut view = ConversationView::new(conversation("C123"), "me");
        assert!(view.merge(message));

        let messages: Vec<_> = view.messages().collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.as_deref(), Some("hello"));
        assert_eq!(messages[0].sender.id, "me");
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 0);

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ClientEvent::NewMessage(broadcast) => {
                assert_eq!(broadcast.id, "m-1");
                assert!(matches!(&broadcast.chat, ChatRef::Populated(chat) if chat.id == "C123"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_file_never_reaches_upload() {
        let backend = FakeBackend::new();
        let sink = RecordingSink::default();
        let draft = OutgoingDraft {
            conversation: conversation("C1"),
            text: "see attached".into(),
            files: vec![file("big.bin", MAX_ATTACHMENT_BYTES + 1)],
        };

        let err = deliver(&backend, &sink, &draft).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ref text) if text.contains("10MB")));
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 0);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_fails_whole_send() {
        let mut backend = FakeBackend::new();
        backend.fail_upload = true;
        let sink = RecordingSink::default();
        let draft = OutgoingDraft {
            conversation: conversation("C1"),
            text: String::new(),
            files: vec![file("note.txt", 12)],
        };

        let err = deliver(&backend, &sink, &draft).await.unwrap_err();
        assert_eq!(err.detail(), "Upload failed");
        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(draft.files.len(), 1);
    }

    #[tokio::test]
    async fn attachments_only_message_has_no_content() {
        let backend = FakeBackend::new();
        let sink = RecordingSink::default();
        let draft = OutgoingDraft {
            conversation: conversation("C1"),
            text: "   ".into(),
            files: vec![file("voice.webm", 2048)],
        };

        let message = deliver(&backend, &sink, &draft).await.unwrap();
        assert!(message.content.is_none());
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_draft_is_rejected() {
        let draft = OutgoingDraft {
            conversation: conversation("C1"),
            text: "  ".into(),
            files: Vec::new(),
        };
        assert!(matches!(draft.validate(), Err(ClientError::Validation(_))));
    }

    #[test]
    fn media_type_from_extension() {
        assert_eq!(guess_media_type(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(guess_media_type(Path::new("rec.webm")), "audio/webm");
        assert_eq!(guess_media_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PendingFile::from_path("definitely/not/here.png").unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
