use std::collections::HashSet;

use chrono::{DateTime, Local, Utc};

use crate::common::{ChatMessage, Conversation, UserProfile};
use crate::realtime::ServerEvent;

/// The signed-in user's conversations, most recently updated first, plus the
/// set of identities currently reported online.
#[derive(Debug, Default)]
pub struct ConversationList {
    self_id: String,
    conversations: Vec<Conversation>,
    online: HashSet<String>,
}

impl ConversationList {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            ..Self::default()
        }
    }

    /// Replace the list with a fresh fetch. Unread counters survive a reload.
    pub fn load(&mut self, mut conversations: Vec<Conversation>) {
        for conversation in &mut conversations {
            if let Some(previous) = self.get(&conversation.id) {
                conversation.unread = previous.unread;
            }
        }
        self.conversations = conversations;
        self.sort();
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|conversation| conversation.id == id)
    }

    /// Record a message that arrived for one of the conversations. Messages
    /// for conversations not in the list, and a repeat of the latest message,
    /// are ignored. Returns whether anything changed.
    pub fn apply_message(&mut self, message: &ChatMessage, open_id: Option<&str>) -> bool {
        let id = message.conversation_id();
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) else {
            log::debug!("Message {} for unknown conversation {id}", message.id);
            return false;
        };

        if conversation
            .latest_message
            .as_ref()
            .is_some_and(|latest| latest.id == message.id)
        {
            return false;
        }

        conversation.latest_message = Some(Box::new(message.clone()));
        conversation.updated_at = message.created_at;
        if open_id != Some(id) && message.sender.id != self.self_id {
            conversation.unread += 1;
        }
        self.sort();
        true
    }

    pub fn mark_read(&mut self, id: &str) {
        if let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) {
            conversation.unread = 0;
        }
    }

    /// Replace an existing entry (a renamed group, a new member) or add a new one.
    pub fn upsert(&mut self, mut conversation: Conversation) {
        match self.conversations.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => {
                conversation.unread = existing.unread;
                if conversation.latest_message.is_none() {
                    conversation.latest_message = existing.latest_message.take();
                }
                *existing = conversation;
            }
            None => self.conversations.insert(0, conversation),
        }
        self.sort();
    }

    pub fn apply_event(&mut self, event: &ServerEvent, open_id: Option<&str>) -> bool {
        match event {
            ServerEvent::MessageReceived(message) => self.apply_message(message, open_id),
            ServerEvent::UserOnline(user_id) => self.online.insert(user_id.clone()),
            ServerEvent::UserOffline(user_id) => self.online.remove(user_id),
            ServerEvent::Typing(_) | ServerEvent::StopTyping(_) => false,
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    /// Whether the other side of a direct conversation is online.
    pub fn partner_online(&self, conversation: &Conversation) -> bool {
        conversation
            .other_participant(&self.self_id)
            .is_some_and(|user| self.is_online(&user.id))
    }

    /// Users that can be offered for a new direct chat: not the signed-in
    /// user and not already a direct-chat partner.
    pub fn available_users<'a>(&self, users: &'a [UserProfile]) -> Vec<&'a UserProfile> {
        let partners: HashSet<&str> = self
            .conversations
            .iter()
            .filter_map(|conversation| conversation.other_participant(&self.self_id))
            .map(|user| user.id.as_str())
            .collect();
        users
            .iter()
            .filter(|user| user.id != self.self_id && !partners.contains(user.id.as_str()))
            .collect()
    }

    fn sort(&mut self) {
        // Stable, so ties keep their previous relative order.
        self.conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }
}

/// Compact age of `at` relative to `now`: "now", "5m", "3h", "2d", then a date.
pub fn recency_label(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;
    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m")
    } else if hours < 24 {
        format!("{hours}h")
    } else if days < 7 {
        format!("{days}d")
    } else {
        at.with_timezone(&Local).format("%d/%m/%Y").to_string()
    }
}
