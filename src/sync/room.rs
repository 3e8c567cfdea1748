use crate::realtime::{ClientEvent, Subscription};

struct Room {
    id: String,
    _subscription: Option<Subscription>,
}

/// idle → joined(id) → idle. At most one room is joined at a time, and its
/// handlers live exactly as long as the membership.
#[derive(Default)]
pub struct RoomMembership {
    room: Option<Room>,
}

impl RoomMembership {
    pub fn current(&self) -> Option<&str> {
        self.room.as_ref().map(|room| room.id.as_str())
    }

    /// Join `id`, leaving the previous room first. The returned events are to
    /// be emitted in order. Re-entering the joined room only swaps handlers.
    pub fn enter(&mut self, id: &str, subscription: Option<Subscription>) -> Vec<ClientEvent> {
        let mut events = Vec::with_capacity(2);
        if self.current() != Some(id) {
            events.extend(self.leave());
            events.push(ClientEvent::JoinChat(id.to_string()));
        }
        self.room = Some(Room {
            id: id.to_string(),
            _subscription: subscription,
        });
        events
    }

    /// Drop the room's handlers and produce its `leave chat`.
    pub fn leave(&mut self) -> Option<ClientEvent> {
        self.room.take().map(|room| ClientEvent::LeaveChat(room.id))
    }

    /// Forget the room without leaving it, for when the channel itself is gone.
    pub fn reset(&mut self) {
        self.room = None;
    }
}
