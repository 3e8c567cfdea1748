use uuid::Uuid;

use crate::common::{ChatMessage, Conversation, NetworkCommand, NetworkEvent, RealtimeScope, UserProfile};
use crate::sync::groups::{matches_search, rename_target, validate_removal};
use crate::sync::{ConversationList, ConversationView, NewGroup, OutgoingDraft, PendingFile};

/// Error shown on the banner, with a retry action when one makes sense.
#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    pub retry: Option<NetworkCommand>,
}

#[derive(Debug, Default)]
pub struct AuthForm {
    pub registering: bool,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Compose box of the open conversation.
#[derive(Debug, Default)]
pub struct Compose {
    pub text: String,
    pub files: Vec<PendingFile>,
    pub attach_path: String,
    /// Draft in flight; only its own result clears the compose box.
    pub sending: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct GroupForm {
    pub name: String,
    pub search: String,
    pub selected: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ManageGroup {
    pub rename: String,
    pub search: String,
}

/// UI-local state.
#[derive(Default)]
pub struct AppState {
    pub profile: Option<UserProfile>,
    pub auth: AuthForm,
    /// Waiting on login or registration.
    pub busy: bool,
    pub notice: Option<String>,
    pub banner: Option<Banner>,
    pub users: Vec<UserProfile>,
    pub list: ConversationList,
    pub view: Option<ConversationView>,
    pub loading_history: bool,
    pub compose: Compose,
    /// User id of a "start chat" request in flight.
    pub starting_chat: Option<String>,
    pub group_form: Option<GroupForm>,
    pub manage: Option<ManageGroup>,
    pub group_busy: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn self_id(&self) -> &str {
        self.profile.as_ref().map_or("", |profile| profile.id.as_str())
    }

    pub fn open_id(&self) -> Option<&str> {
        self.view.as_ref().map(ConversationView::id)
    }

    /// Fold one network event into the state. Returns follow-up commands.
    pub fn apply(&mut self, event: NetworkEvent) -> Vec<NetworkCommand> {
        match event {
            NetworkEvent::SessionChanged(profile) => {
                let auth = std::mem::take(&mut self.auth);
                *self = Self::new();
                match profile {
                    Some(profile) => {
                        self.list = ConversationList::new(profile.id.clone());
                        self.profile = Some(profile);
                        return vec![NetworkCommand::LoadDirectory];
                    }
                    None => {
                        // Keep what was typed on the sign-in form, except the password.
                        self.auth = AuthForm {
                            password: String::new(),
                            ..auth
                        };
                    }
                }
            }
            NetworkEvent::Notice(message) => {
                self.busy = false;
                self.auth.registering = false;
                self.notice = Some(message);
            }
            NetworkEvent::DirectoryLoaded {
                users,
                conversations,
            } => {
                self.users = users;
                self.list.load(conversations);
            }
            NetworkEvent::ConversationStarted(conversation) => {
                self.starting_chat = None;
                self.list.upsert(conversation.clone());
                return self.open_conversation(conversation);
            }
            NetworkEvent::GroupUpserted(conversation) => {
                self.group_busy = false;
                self.group_form = None;
                if let Some(manage) = &mut self.manage {
                    manage.rename.clear();
                }
                if let Some(view) = &mut self.view {
                    view.refresh(conversation.clone());
                }
                self.list.upsert(conversation);
            }
            NetworkEvent::HistoryLoaded {
                conversation_id,
                messages,
            } => match &mut self.view {
                Some(view) if view.id() == conversation_id => {
                    view.load_history(messages);
                    self.loading_history = false;
                }
                _ => log::debug!("Discarding history for closed conversation {conversation_id}"),
            },
            NetworkEvent::MessageSent { draft_id, message } => {
                if self.compose.sending == Some(draft_id) {
                    let attach_path = std::mem::take(&mut self.compose.attach_path);
                    self.compose = Compose {
                        attach_path,
                        ..Compose::default()
                    };
                }
                self.record_sent(message);
            }
            NetworkEvent::SendFailed {
                draft_id,
                error,
                retryable,
            } => {
                // Retry only while the compose box still holds the failed draft.
                let current = self.compose.sending == Some(draft_id);
                if current {
                    self.compose.sending = None;
                }
                let retry = (current && retryable)
                    .then(|| self.compose_draft())
                    .flatten()
                    .map(|draft| NetworkCommand::SendMessage { draft_id, draft });
                self.banner = Some(Banner {
                    message: error,
                    retry,
                });
            }
            NetworkEvent::Realtime { scope, event } => match scope {
                RealtimeScope::Directory => {
                    let open_id = self.view.as_ref().map(|view| view.id().to_string());
                    self.list.apply_event(&event, open_id.as_deref());
                }
                RealtimeScope::Room(id) => {
                    if let Some(view) = self.view.as_mut().filter(|view| view.id() == id) {
                        view.apply_event(&event);
                    }
                }
            },
            NetworkEvent::RequestFailed { message, retry } => {
                self.busy = false;
                self.group_busy = false;
                self.starting_chat = None;
                if matches!(retry, Some(NetworkCommand::OpenConversation(_))) {
                    self.loading_history = false;
                }
                self.banner = Some(Banner { message, retry });
            }
        }
        Vec::new()
    }

    fn record_sent(&mut self, message: ChatMessage) {
        let open_id = self.open_id().map(str::to_string);
        self.list.apply_message(&message, open_id.as_deref());
        match &mut self.view {
            Some(view) if view.id() == message.conversation_id() => {
                view.merge(message);
            }
            _ => log::debug!("Sent message {} lands in a closed conversation", message.id),
        }
    }

    pub fn open_conversation(&mut self, conversation: Conversation) -> Vec<NetworkCommand> {
        if self.open_id() == Some(conversation.id.as_str()) {
            return Vec::new();
        }
        self.list.mark_read(&conversation.id);
        self.view = Some(ConversationView::new(conversation.clone(), self.self_id()));
        self.loading_history = true;
        self.compose = Compose::default();
        self.manage = None;
        vec![NetworkCommand::OpenConversation(conversation)]
    }

    pub fn close_conversation(&mut self) -> Option<NetworkCommand> {
        self.manage = None;
        self.compose = Compose::default();
        self.view.take().map(|_| NetworkCommand::CloseConversation)
    }

    pub fn start_chat(&mut self, user_id: &str) -> Option<NetworkCommand> {
        if self.starting_chat.is_some() {
            return None;
        }
        self.starting_chat = Some(user_id.to_string());
        Some(NetworkCommand::StartDirectChat {
            user_id: user_id.to_string(),
        })
    }

    pub fn keystroke(&self) -> Option<NetworkCommand> {
        self.view.as_ref().map(|_| NetworkCommand::Keystroke)
    }

    /// Build a send from the compose box. Invalid drafts never leave the UI.
    pub fn submit(&mut self) -> Option<NetworkCommand> {
        if self.compose.sending.is_some() {
            return None;
        }
        let draft = self.compose_draft()?;
        if let Err(err) = draft.validate() {
            self.show_error(err.user_message("Message is empty"));
            return None;
        }
        let draft_id = Uuid::new_v4();
        self.compose.sending = Some(draft_id);
        Some(NetworkCommand::SendMessage { draft_id, draft })
    }

    fn compose_draft(&self) -> Option<OutgoingDraft> {
        let view = self.view.as_ref()?;
        Some(OutgoingDraft {
            conversation: view.conversation().clone(),
            text: self.compose.text.clone(),
            files: self.compose.files.clone(),
        })
    }

    pub fn attach_file(&mut self) {
        let path = self.compose.attach_path.trim().to_string();
        if path.is_empty() {
            return;
        }
        match PendingFile::from_path(&path) {
            Ok(file) => {
                self.compose.files.push(file);
                self.compose.attach_path.clear();
            }
            Err(err) => self.show_error(err.user_message(&format!("Cannot attach {path}"))),
        }
    }

    pub fn remove_attachment(&mut self, index: usize) {
        if index < self.compose.files.len() {
            self.compose.files.remove(index);
        }
    }

    pub fn login(&mut self) -> Option<NetworkCommand> {
        if self.busy {
            return None;
        }
        self.busy = true;
        self.notice = None;
        Some(if self.auth.registering {
            NetworkCommand::Register {
                name: self.auth.name.clone(),
                email: self.auth.email.clone(),
                password: self.auth.password.clone(),
            }
        } else {
            NetworkCommand::Login {
                email: self.auth.email.clone(),
                password: self.auth.password.clone(),
            }
        })
    }

    /// Users the create-group form can pick from, filtered by its search box.
    pub fn group_candidates(&self) -> Vec<&UserProfile> {
        let search = self
            .group_form
            .as_ref()
            .map_or("", |form| form.search.as_str());
        self.users
            .iter()
            .filter(|user| user.id != self.self_id() && matches_search(user, search))
            .collect()
    }

    pub fn create_group(&mut self) -> Option<NetworkCommand> {
        let form = self.group_form.as_mut()?;
        if self.group_busy {
            return None;
        }
        match NewGroup::new(&form.name, form.selected.iter().cloned()) {
            Ok(group) => {
                form.error = None;
                self.group_busy = true;
                Some(NetworkCommand::CreateGroup(group))
            }
            Err(err) => {
                form.error = Some(err.user_message("Failed to create group"));
                None
            }
        }
    }

    pub fn rename_group(&mut self) -> Option<NetworkCommand> {
        let view = self.view.as_ref()?;
        let manage = self.manage.as_ref()?;
        let name = rename_target(view.conversation(), &manage.rename)?;
        self.group_busy = true;
        Some(NetworkCommand::RenameGroup {
            conversation_id: view.id().to_string(),
            name,
        })
    }

    pub fn add_member(&mut self, user_id: &str) -> Option<NetworkCommand> {
        let conversation_id = self.open_id()?.to_string();
        self.group_busy = true;
        Some(NetworkCommand::AddMember {
            conversation_id,
            user_id: user_id.to_string(),
        })
    }

    pub fn remove_member(&mut self, user_id: &str) -> Option<NetworkCommand> {
        let view = self.view.as_ref()?;
        if let Err(err) = validate_removal(view.conversation(), user_id) {
            self.show_error(err.user_message("Failed to remove member"));
            return None;
        }
        let conversation_id = view.id().to_string();
        self.group_busy = true;
        Some(NetworkCommand::RemoveMember {
            conversation_id,
            user_id: user_id.to_string(),
        })
    }

    pub fn retry(&mut self) -> Option<NetworkCommand> {
        let command = self.banner.take()?.retry?;
        match &command {
            NetworkCommand::LoadDirectory => {}
            NetworkCommand::OpenConversation(conversation) => {
                // Only worth retrying while the conversation is still open.
                if self.open_id() != Some(conversation.id.as_str()) {
                    return None;
                }
                self.loading_history = true;
            }
            NetworkCommand::StartDirectChat { user_id } => {
                self.starting_chat = Some(user_id.clone());
            }
            NetworkCommand::SendMessage { draft, .. } => {
                // Resend whatever the compose box holds now, under a new draft id.
                if self.open_id() != Some(draft.conversation.id.as_str()) {
                    return None;
                }
                return self.submit();
            }
            _ => self.group_busy = true,
        }
        Some(command)
    }

    pub fn show_error(&mut self, message: String) {
        self.banner = Some(Banner {
            message,
            retry: None,
        });
    }
}
