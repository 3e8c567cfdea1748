//! Outbound typing indicator: `typing` on the first keystroke of a burst,
//! `stop typing` once the user has been quiet for [`TYPING_TIMEOUT`].

use std::time::Duration;

use tokio::time::Instant;

use crate::realtime::{ClientEvent, TypingNotice};

pub const TYPING_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug)]
struct Pending {
    chat_id: String,
    deadline: Instant,
}

#[derive(Debug, Default)]
pub struct TypingDebouncer {
    user_name: String,
    pending: Option<Pending>,
}

impl TypingDebouncer {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            pending: None,
        }
    }

    fn notice(&self, chat_id: String) -> TypingNotice {
        TypingNotice {
            chat_id,
            user_name: self.user_name.clone(),
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the network loop should next call [`poll`](Self::poll).
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    pub fn keystroke(&mut self, chat_id: &str, now: Instant) -> Vec<ClientEvent> {
        let deadline = now + TYPING_TIMEOUT;
        if let Some(pending) = self.pending.as_mut().filter(|p| p.chat_id == chat_id) {
            pending.deadline = deadline;
            return Vec::new();
        }

        let mut events: Vec<ClientEvent> = self.cancel().into_iter().collect();
        events.push(ClientEvent::Typing(self.notice(chat_id.to_string())));
        self.pending = Some(Pending {
            chat_id: chat_id.to_string(),
            deadline,
        });
        events
    }

    /// The trailing `stop typing`, once the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<ClientEvent> {
        if self.deadline().is_some_and(|deadline| now >= deadline) {
            return self.cancel();
        }
        None
    }

    /// Sending always ends the typing burst, timer or not.
    pub fn submit(&mut self, chat_id: &str) -> ClientEvent {
        let stale = self.pending.take();
        if let Some(stale) = stale.filter(|pending| pending.chat_id != chat_id) {
            log::debug!("Dropping typing timer for {}", stale.chat_id);
        }
        ClientEvent::StopTyping(self.notice(chat_id.to_string()))
    }

    /// Clear the timer, yielding `stop typing` if one was pending.
    pub fn cancel(&mut self) -> Option<ClientEvent> {
        let pending = self.pending.take()?;
        Some(ClientEvent::StopTyping(self.notice(pending.chat_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(event: &ClientEvent) -> String {
        match event {
            ClientEvent::Typing(notice) => format!("typing {}", notice.chat_id),
            ClientEvent::StopTyping(notice) => format!("stop {}", notice.chat_id),
            other => other.wire_name().to_string(),
        }
    }

    fn all(events: Vec<ClientEvent>) -> Vec<String> {
        events.iter().map(describe).collect()
    }

    #[test]
    fn burst_emits_one_typing_and_a_trailing_stop() {
        let start = Instant::now();
        let mut typing = TypingDebouncer::new("An");

        assert_eq!(all(typing.keystroke("c1", start)), ["typing c1"]);
        let later = start + Duration::from_millis(1000);
        assert!(typing.keystroke("c1", later).is_empty());
        assert_eq!(typing.deadline(), Some(later + TYPING_TIMEOUT));

        assert!(typing.poll(later + Duration::from_millis(2999)).is_none());
        let stop = typing.poll(later + TYPING_TIMEOUT).unwrap();
        assert_eq!(describe(&stop), "stop c1");
        assert!(!typing.is_pending());
        assert!(typing.poll(later + Duration::from_secs(10)).is_none());

        // A new burst starts with a fresh `typing`.
        assert_eq!(all(typing.keystroke("c1", later + Duration::from_secs(11))), ["typing c1"]);
    }

    #[test]
    fn submit_stops_immediately() {
        let mut typing = TypingDebouncer::new("An");
        typing.keystroke("c1", Instant::now());
        assert_eq!(describe(&typing.submit("c1")), "stop c1");
        assert!(typing.deadline().is_none());
        // Even with nothing pending.
        assert_eq!(describe(&typing.submit("c1")), "stop c1");
    }

    #[test]
    fn switching_conversations_stops_the_previous_one() {
        let now = Instant::now();
        let mut typing = TypingDebouncer::new("An");
        typing.keystroke("c1", now);
        assert_eq!(all(typing.keystroke("c2", now)), ["stop c1", "typing c2"]);
        assert_eq!(typing.cancel().map(|event| describe(&event)).as_deref(), Some("stop c2"));
        assert!(typing.cancel().is_none());
    }

    #[test]
    fn notices_carry_the_user_name() {
        let mut typing = TypingDebouncer::new("An");
        match typing.keystroke("c1", Instant::now()).remove(0) {
            ClientEvent::Typing(notice) => assert_eq!(notice.user_name, "An"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
