use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Local, Utc};

use crate::common::{ChatMessage, Conversation, TypingUser};
use crate::realtime::{ServerEvent, TypingSignal};

/// The open conversation: its messages keyed by id and rendered in
/// (created_at, id) order, and who is typing in it right now.
#[derive(Debug)]
pub struct ConversationView {
    conversation: Conversation,
    self_id: String,
    messages: HashMap<String, ChatMessage>,
    timeline: BTreeSet<(DateTime<Utc>, String)>,
    typing: Vec<TypingUser>,
}

impl ConversationView {
    pub fn new(conversation: Conversation, self_id: impl Into<String>) -> Self {
        Self {
            conversation,
            self_id: self_id.into(),
            messages: HashMap::new(),
            timeline: BTreeSet::new(),
            typing: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Swap in fresher conversation metadata (rename, membership change).
    pub fn refresh(&mut self, conversation: Conversation) {
        if conversation.id == self.conversation.id {
            self.conversation = conversation;
        }
    }

    /// Insert `message` unless it belongs elsewhere or is already present.
    pub fn merge(&mut self, message: ChatMessage) -> bool {
        if message.conversation_id() != self.conversation.id
            || self.messages.contains_key(&message.id)
        {
            return false;
        }
        self.timeline.insert((message.created_at, message.id.clone()));
        self.messages.insert(message.id.clone(), message);
        true
    }

    /// Merge a fetched history page; returns how many messages were new.
    pub fn load_history(&mut self, messages: Vec<ChatMessage>) -> usize {
        let mut added = 0;
        for message in messages {
            if self.merge(message) {
                added += 1;
            }
        }
        added
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> + '_ {
        self.timeline
            .iter()
            .filter_map(|(_, id)| self.messages.get(id))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn apply_event(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::MessageReceived(message) => self.merge(message.clone()),
            ServerEvent::Typing(signal) => {
                if !self.concerns_others(signal)
                    || self.typing.iter().any(|user| user.user_id == signal.user_id)
                {
                    return false;
                }
                self.typing.push(TypingUser {
                    user_id: signal.user_id.clone(),
                    user_name: signal
                        .user_name
                        .clone()
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| "Someone".to_string()),
                });
                true
            }
            ServerEvent::StopTyping(signal) => {
                if !self.concerns_others(signal) {
                    return false;
                }
                let before = self.typing.len();
                self.typing.retain(|user| user.user_id != signal.user_id);
                self.typing.len() != before
            }
            ServerEvent::UserOnline(_) | ServerEvent::UserOffline(_) => false,
        }
    }

    fn concerns_others(&self, signal: &TypingSignal) -> bool {
        signal.user_id != self.self_id
            && signal
                .chat_id
                .as_deref()
                .is_none_or(|chat_id| chat_id == self.conversation.id)
    }

    #[cfg(test)]
    pub fn typing_users(&self) -> &[TypingUser] {
        &self.typing
    }

    pub fn typing_label(&self) -> Option<String> {
        if self.typing.is_empty() {
            return None;
        }
        if !self.conversation.is_group {
            return Some("Typing...".to_string());
        }
        let names: Vec<&str> = self.typing.iter().map(|user| user.user_name.as_str()).collect();
        Some(format!("{} is typing...", names.join(", ")))
    }
}

/// "14:05" for today, "May 01, 14:05" otherwise (local time).
pub fn message_time_label(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let local = at.with_timezone(&Local);
    if local.date_naive() == now.with_timezone(&Local).date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%b %d, %H:%M").to_string()
    }
}
