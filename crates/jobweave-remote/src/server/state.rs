//! Publishes the state of an exported stateful job.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use jobweave_protocols::{ListenerId, StateEvent, Stateful};

use crate::bus::NotificationBus;
use crate::error::Result;
use crate::notification::{Notification, RemoteId, StateData, STATE_TYPE};

pub(crate) struct ServerStateHandler {
    shared: Arc<Shared>,
    subscription: Mutex<Option<ListenerId>>,
}

struct Shared {
    id: RemoteId,
    bus: Arc<NotificationBus>,
    last: Mutex<Option<Notification>>,
}

impl Shared {
    fn on_event(&self, event: &StateEvent) {
        let data = StateData {
            state: event.state,
            time: event.time,
            exception: event.exception.as_ref().map(|e| e.to_string()),
        };
        let mut last = self.last.lock();
        let sequence = self.bus.next_sequence(self.id, STATE_TYPE);
        match Notification::new(self.id, STATE_TYPE, sequence, &data) {
            Ok(notification) => {
                self.bus.send(&notification);
                *last = Some(notification);
            }
            Err(e) => error!(id = %self.id, "Failed to build state notification: {}", e),
        }
    }
}

impl ServerStateHandler {
    pub(crate) fn new(id: RemoteId, bus: Arc<NotificationBus>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                bus,
                last: Mutex::new(None),
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Start publishing. The job's current state is published at once.
    pub(crate) fn attach(&self, stateful: &dyn Stateful) {
        let shared = self.shared.clone();
        let id = stateful.add_state_listener(Arc::new(move |event: &StateEvent| shared.on_event(event)));
        *self.subscription.lock() = Some(id);
    }

    pub(crate) fn last_notifications(&self) -> Result<Vec<Notification>> {
        Ok(self.shared.last.lock().iter().cloned().collect())
    }

    pub(crate) fn destroy(&self, stateful: Option<&dyn Stateful>) {
        if let (Some(id), Some(stateful)) = (self.subscription.lock().take(), stateful) {
            stateful.remove_state_listener(id);
        }
    }
}
