use reqwest::Url;

use crate::common::Session;

use super::channel::{RealtimeChannel, RealtimeEmitter};
use super::events::ClientEvent;

/// Keeps at most one [`RealtimeChannel`], bound to whoever is signed in.
pub struct RealtimeLink {
    url: Url,
    channel: Option<RealtimeChannel>,
}

impl RealtimeLink {
    pub fn new(url: Url) -> Self {
        Self { url, channel: None }
    }

    /// Follow a session change. Returns `true` when the channel was replaced
    /// or removed, in which case every subscription made on the old one is dead.
    pub async fn sync_with(&mut self, session: Option<&Session>) -> bool {
        let wanted = session.map(|session| session.id.as_str());
        let current = self.channel.as_ref().map(RealtimeChannel::identity);
        if wanted == current {
            return false;
        }

        self.close().await;

        if let Some(session) = session {
            match RealtimeChannel::open(&self.url, &session.profile()).await {
                Ok(channel) => self.channel = Some(channel),
                // No live updates until the next sign-in; REST keeps working.
                Err(err) => log::warn!("Realtime unavailable for {}: {err}", session.id),
            }
        }
        true
    }

    pub fn channel(&self) -> Option<&RealtimeChannel> {
        self.channel.as_ref()
    }

    pub fn emitter(&self) -> Option<RealtimeEmitter> {
        self.channel.as_ref().map(RealtimeChannel::emitter)
    }

    pub fn emit(&self, event: ClientEvent) {
        match &self.channel {
            Some(channel) => channel.emit(event),
            None => log::debug!("No realtime channel; dropping `{}`", event.wire_name()),
        }
    }

    pub async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            log::info!("Closing realtime channel for {}", channel.identity());
            channel.close().await;
        }
    }
}
