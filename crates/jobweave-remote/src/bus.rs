//! An in-process notification channel.
//!
//! Listeners register per `(source, kind)` channel. Delivery is synchronous
//! on the sender's thread, so a sender that serialises its sends preserves
//! order within a channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use jobweave_core::ListenerRegistry;
use jobweave_protocols::ListenerId;

use crate::error::{RemoteError, Result};
use crate::notification::{Notification, RemoteId};

type Channel = (RemoteId, String);

#[derive(Default)]
pub struct NotificationBus {
    listeners: DashMap<Channel, Arc<ListenerRegistry<dyn Fn(&Notification) + Send + Sync>>>,
    sequences: DashMap<Channel, Arc<AtomicU64>>,
    closed: AtomicBool,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(
        &self,
        source: RemoteId,
        kind: &str,
        listener: Arc<dyn Fn(&Notification) + Send + Sync>,
    ) -> Result<ListenerId> {
        if self.is_closed() {
            return Err(RemoteError::ChannelClosed);
        }
        let registry = self
            .listeners
            .entry((source, kind.to_string()))
            .or_default()
            .clone();
        let id = registry.add(listener);
        trace!(%source, kind, %id, "Notification listener added");
        Ok(id)
    }

    pub fn remove_listener(&self, source: RemoteId, kind: &str, id: ListenerId) {
        let channel = (source, kind.to_string());
        if let Some(registry) = self.listeners.get(&channel).map(|r| r.clone()) {
            registry.remove(id);
        }
    }

    /// The next sequence number for a channel, starting at 1.
    pub fn next_sequence(&self, source: RemoteId, kind: &str) -> u64 {
        let counter = self
            .sequences
            .entry((source, kind.to_string()))
            .or_default()
            .clone();
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The last sequence number handed out for a channel, 0 if none.
    pub fn last_sequence(&self, source: RemoteId, kind: &str) -> u64 {
        self.sequences
            .get(&(source, kind.to_string()))
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }

    /// Deliver to every listener of the notification's channel.
    pub fn send(&self, notification: &Notification) {
        if self.is_closed() {
            debug!(source = %notification.source, kind = %notification.kind, "Channel closed, notification dropped");
            return;
        }
        // Clone out of the map so no shard lock is held during delivery.
        let registry = self
            .listeners
            .get(&(notification.source, notification.kind.clone()))
            .map(|r| r.clone());
        if let Some(registry) = registry {
            for listener in registry.snapshot() {
                listener(notification);
            }
        }
    }

    /// Forget the sequence and listeners of a channel.
    pub fn forget(&self, source: RemoteId) {
        self.listeners.retain(|(s, _), _| *s != source);
        self.sequences.retain(|(s, _), _| *s != source);
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listeners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self, source: RemoteId, kind: &str) -> usize {
        self.listeners
            .get(&(source, kind.to_string()))
            .map_or(0, |r| r.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn note(source: u64, sequence: u64) -> Notification {
        Notification::new(RemoteId(source), "test", sequence, &sequence).unwrap()
    }

    #[test]
    fn test_delivers_per_channel() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = bus
            .add_listener(RemoteId(1), "test", Arc::new(move |n: &Notification| sink.lock().push(n.sequence)))
            .unwrap();

        bus.send(&note(1, 1));
        bus.send(&note(2, 9));
        bus.send(&note(1, 2));
        assert_eq!(*seen.lock(), vec![1, 2]);

        bus.remove_listener(RemoteId(1), "test", id);
        bus.send(&note(1, 3));
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(bus.listener_count(RemoteId(1), "test"), 0);
    }

    #[test]
    fn test_sequences_per_channel() {
        let bus = NotificationBus::new();
        assert_eq!(bus.last_sequence(RemoteId(1), "a"), 0);
        assert_eq!(bus.next_sequence(RemoteId(1), "a"), 1);
        assert_eq!(bus.next_sequence(RemoteId(1), "a"), 2);
        assert_eq!(bus.next_sequence(RemoteId(1), "b"), 1);
        assert_eq!(bus.last_sequence(RemoteId(1), "a"), 2);
    }

    #[test]
    fn test_closed_bus_rejects_listeners() {
        let bus = NotificationBus::new();
        bus.close();
        assert!(matches!(
            bus.add_listener(RemoteId(1), "test", Arc::new(|_: &Notification| {})),
            Err(RemoteError::ChannelClosed)
        ));
    }
}
