//! Typed publish/subscribe callback lists
//!
//! A [`Delegate<E>`] holds callbacks that are invoked in subscription order
//! whenever an `E` is published. Invocation works on a snapshot of the
//! subscriber list, so callbacks may subscribe or unsubscribe (themselves or
//! others) while the delegate is being invoked. A subscriber removed during
//! an invocation is not called for the remainder of it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Subscriber ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Subscriber<E> {
    id: SubscriptionId,
    alive: Arc<AtomicBool>,
    callback: Callback<E>,
}

/// A list of callbacks bound to events of type `E`
pub struct Delegate<E> {
    subscribers: Mutex<Vec<Subscriber<E>>>,
    next_id: AtomicU64,
}

impl<E> Delegate<E> {
    /// Create an empty delegate
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Bind a callback, returning the id used to unbind it
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push(Subscriber {
            id,
            alive: Arc::new(AtomicBool::new(true)),
            callback: Arc::new(callback),
        });
        id
    }

    /// Unbind a callback. Returns false if the id was not bound.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                let removed = subscribers.remove(index);
                removed.alive.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Call every bound callback with `event`, returning how many ran
    pub fn invoke(&self, event: &E) -> usize {
        let snapshot: Vec<(Arc<AtomicBool>, Callback<E>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| (Arc::clone(&s.alive), Arc::clone(&s.callback)))
            .collect();

        let mut called = 0;
        for (alive, callback) in snapshot {
            if alive.load(Ordering::Acquire) {
                callback(event);
                called += 1;
            }
        }
        called
    }

    /// Number of bound callbacks
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unbind everything
    pub fn clear(&self) {
        for subscriber in self.subscribers.lock().drain(..) {
            subscriber.alive.store(false, Ordering::Release);
        }
    }
}

impl<E> Default for Delegate<E> {
    fn default() -> Self {
        Self::new()
    }
}
