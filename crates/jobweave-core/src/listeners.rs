//! Listener bookkeeping shared by state handlers and structural helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use jobweave_protocols::ListenerId;

/// An ordered set of listeners keyed by [`ListenerId`].
///
/// Notification works from a snapshot, so a listener may add or remove
/// listeners (itself included) while being notified.
pub struct ListenerRegistry<L: ?Sized> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<L>)>>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener.
    pub fn add(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Remove a listener, returning it if it was registered.
    pub fn remove(&self, id: ListenerId) -> Option<Arc<L>> {
        let mut listeners = self.listeners.lock();
        let pos = listeners.iter().position(|(lid, _)| *lid == id)?;
        Some(listeners.remove(pos).1)
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    /// Current listeners in registration order.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// A callback that can be delivered at most once.
///
/// The subscription is consumed by the first delivery that passes the
/// filter; later deliveries are ignored.
pub struct OneShot<E> {
    callback: Mutex<Option<Box<dyn FnOnce(&E) + Send>>>,
}

impl<E> OneShot<E> {
    pub fn new<F>(callback: F) -> Arc<Self>
    where
        F: FnOnce(&E) + Send + 'static,
    {
        Arc::new(Self {
            callback: Mutex::new(Some(Box::new(callback))),
        })
    }

    /// Deliver `event`. Returns true if this delivery consumed the callback.
    pub fn fire(&self, event: &E) -> bool {
        // Take before calling so a re-entrant delivery sees it spent.
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Discard the callback without calling it.
    pub fn cancel(&self) -> bool {
        self.callback.lock().take().is_some()
    }

    pub fn is_spent(&self) -> bool {
        self.callback.lock().is_none()
    }
}
