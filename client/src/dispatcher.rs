use events::{Category, Incoming};
use log::*;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

type Listener = Arc<dyn Fn(&Incoming) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<Category, Vec<(u64, Listener)>>,
}

/// Misuse of the dispatcher API.
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchError {
    UnknownCategory(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DispatchError::UnknownCategory(name) => {
                write!(f, "cannot subscribe to unknown category `{name}`")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

/// Routes every decoded push event to the listeners of its category.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `category`. The listener stays registered
    /// until the returned [`Subscription`] is dropped or unsubscribed.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe<F>(&self, category: Category, listener: F) -> Subscription
    where
        F: Fn(&Incoming) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .listeners
            .entry(category)
            .or_default()
            .push((id, Arc::new(listener)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            category,
            id,
        }
    }

    /// Like [`subscribe`](Self::subscribe) for a category given by name.
    pub fn subscribe_named<F>(&self, name: &str, listener: F) -> Result<Subscription, DispatchError>
    where
        F: Fn(&Incoming) + Send + Sync + 'static,
    {
        let category = name
            .parse::<Category>()
            .map_err(|_| DispatchError::UnknownCategory(name.to_string()))?;
        Ok(self.subscribe(category, listener))
    }

    /// Invokes every listener of the event's category and returns how many
    /// ran to completion. The handshake frame is never delivered.
    pub fn dispatch(&self, incoming: &Incoming) -> usize {
        if matches!(incoming, Incoming::Handshake) {
            return 0;
        }

        let category = incoming.category();
        if let Incoming::Unrecognized { event_type, .. } = incoming {
            debug!("Dispatching unrecognized event {event_type} to {category}");
        }

        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<Listener> = lock(&self.registry)
            .listeners
            .get(&category)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(incoming))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    "A {category} listener panicked while handling {}",
                    incoming.event_type()
                ),
            }
        }
        delivered
    }

    pub fn listener_count(&self, category: Category) -> usize {
        lock(&self.registry)
            .listeners
            .get(&category)
            .map_or(0, Vec::len)
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    category: Category,
    id: u64,
}

impl Subscription {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Some(entries) = lock(&registry).listeners.get_mut(&self.category) {
                entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

// A listener that panicked never holds the lock, so poisoning is not fatal.
fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
