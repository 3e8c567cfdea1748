use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::events::{EventKind, ServerEvent};

type Handler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, Handler)>>,
    closed: bool,
}

/// Routes decoded inbound events to the handlers registered for their kind.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Dispatcher {
    /// Register `handler` for every kind in `kinds`. The handler stays
    /// registered until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, kinds: &[EventKind], handler: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let mut registry = lock(&self.registry);
        if registry.closed {
            return Subscription::inert();
        }

        let mut entries = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            registry.next_id += 1;
            let id = registry.next_id;
            registry
                .handlers
                .entry(kind)
                .or_default()
                .push((id, handler.clone()));
            entries.push((kind, id));
        }

        Subscription {
            registry: Arc::downgrade(&self.registry),
            entries,
        }
    }

    /// Returns how many handlers saw the event.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        // Handlers run outside the lock so they may subscribe or drop subscriptions.
        let handlers: Vec<Handler> = {
            let registry = lock(&self.registry);
            if registry.closed {
                return 0;
            }
            registry
                .handlers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
                .unwrap_or_default()
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Drop every handler and refuse new ones.
    pub fn close(&self) {
        let mut registry = lock(&self.registry);
        registry.closed = true;
        registry.handlers.clear();
    }

    #[cfg(test)]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        lock(&self.registry)
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Disposer for a registration made through [`Dispatcher::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    entries: Vec<(EventKind, u64)>,
}

impl Subscription {
    fn inert() -> Self {
        Self {
            registry: Weak::new(),
            entries: Vec::new(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        for (kind, id) in self.entries.drain(..) {
            if let Some(list) = registry.handlers.get_mut(&kind) {
                list.retain(|(handler_id, _)| *handler_id != id);
            }
        }
    }
}
