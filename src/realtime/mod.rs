pub mod channel;
pub mod codec;
pub mod dispatch;
pub mod events;
pub mod link;
#[cfg(test)]
pub mod testing;

pub use dispatch::{Dispatcher, Subscription};
pub use events::{ClientEvent, EventKind, ServerEvent, TypingNotice, TypingSignal};
pub use link::RealtimeLink;
