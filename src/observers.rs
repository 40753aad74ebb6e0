// src/observers.rs

use crate::uid::Uid;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

/// Callback receiving the UID on the reader, or `None` once it is gone.
pub type Listener = Box<dyn FnMut(Option<Uid>) + Send>;

/// Identifies one subscription. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Entry = (SubscriptionId, Arc<Mutex<Listener>>);

#[derive(Default)]
struct Registry {
    next_id: u64,
    latest: Option<Uid>,
    listeners: Vec<Entry>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking listener must not take the whole registry down with it.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Latest value plus the set of listeners interested in changes of it.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        ObserverRegistry::default()
    }

    /// Registers `listener` and immediately hands it the current value. A
    /// listener that panics is unsubscribed; the others keep receiving.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(Option<Uid>) + Send + 'static,
    {
        let listener: Arc<Mutex<Listener>> = Arc::new(Mutex::new(Box::new(listener)));

        let mut registry = lock(&self.inner);
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, listener.clone()));
        let current = registry.latest;
        // Held until the first call returns so later publishes queue behind it.
        let first = lock(&listener);
        drop(registry);
        self.deliver(id, first, current);

        Subscription {
            registry: self.clone(),
            id,
        }
    }

    /// Removes a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = lock(&self.inner);
        let before = registry.listeners.len();
        registry.listeners.retain(|(other, _)| *other != id);
        registry.listeners.len() != before
    }

    /// Stores `value` and delivers it to every listener in subscription
    /// order.
    pub fn publish(&self, value: Option<Uid>) {
        let snapshot: Vec<Entry> = {
            let mut registry = lock(&self.inner);
            registry.latest = value;
            registry.listeners.clone()
        };

        for (id, listener) in snapshot {
            // Listeners removed by an earlier callback are skipped.
            if !self.is_subscribed(id) {
                continue;
            }
            self.deliver(id, lock(&listener), value);
        }
    }

    fn deliver(
        &self,
        id: SubscriptionId,
        mut listener: MutexGuard<'_, Listener>,
        value: Option<Uid>,
    ) {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| (*listener)(value)));
        drop(listener);
        if delivered.is_err() {
            self.unsubscribe(id);
        }
    }

    pub fn latest(&self) -> Option<Uid> {
        lock(&self.inner).latest
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        lock(&self.inner)
            .listeners
            .iter()
            .any(|(other, _)| *other == id)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returned by `subscribe`; the listener stays registered until
/// `unsubscribe` is called.
pub struct Subscription {
    registry: ObserverRegistry,
    id: SubscriptionId,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(self) -> bool {
        self.registry.unsubscribe(self.id)
    }
}
