//! Mirrors the state of a remote stateful job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tracing::{debug, error};

use jobweave_core::ListenerRegistry;
use jobweave_protocols::{JobError, JobState, ListenerId, StateEvent, StateListener, Stateful};

use crate::connection::{operations, Connection};
use crate::error::Result;
use crate::notification::{Notification, RemoteId, StateData, STATE_TYPE};
use crate::synchronizer::Synchronizer;

struct Shared {
    name: String,
    listeners: ListenerRegistry<dyn Fn(&StateEvent) + Send + Sync>,
    // Held while delivering so listeners see events in order.
    delivery: ReentrantMutex<()>,
    last: Mutex<StateEvent>,
}

impl Shared {
    fn publish(&self, event: StateEvent) {
        let _delivery = self.delivery.lock();
        *self.last.lock() = event.clone();
        for listener in self.listeners.snapshot() {
            listener(&event);
        }
    }

    fn event_from(&self, notification: &Notification) -> Result<StateEvent> {
        let data = notification.payload::<StateData>()?;
        Ok(StateEvent {
            source: self.name.clone(),
            state: data.state,
            time: data.time,
            exception: data.exception.map(|m| Arc::new(JobError::failed(m))),
        })
    }

    fn apply(&self, notification: &Notification) {
        match self.event_from(notification) {
            Ok(event) => self.publish(event),
            Err(e) => error!(source = %notification.source, "Bad state notification: {}", e),
        }
    }
}

struct Subscription {
    listener: ListenerId,
    live: Arc<AtomicBool>,
}

pub struct ClientStateHandler {
    id: RemoteId,
    connection: Arc<dyn Connection>,
    shared: Arc<Shared>,
    subscription: Mutex<Option<Subscription>>,
}

impl ClientStateHandler {
    pub(crate) fn new(id: RemoteId, name: &str, connection: Arc<dyn Connection>) -> Self {
        Self {
            id,
            connection,
            shared: Arc::new(Shared {
                name: name.to_string(),
                listeners: ListenerRegistry::new(),
                delivery: ReentrantMutex::new(()),
                last: Mutex::new(StateEvent::new(name, JobState::Ready)),
            }),
            subscription: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.lock().is_some()
    }

    fn connect(&self) -> Result<Subscription> {
        let live = Arc::new(AtomicBool::new(true));
        let on_notification = {
            let live = live.clone();
            let shared = self.shared.clone();
            move |notification: &Notification| {
                if live.load(Ordering::SeqCst) {
                    shared.apply(notification);
                }
            }
        };
        let synchronizer = Arc::new(Synchronizer::new(Arc::new(on_notification)));
        let handle = {
            let synchronizer = synchronizer.clone();
            Arc::new(move |n: &Notification| synchronizer.handle(n))
        };
        let listener = self
            .connection
            .add_notification_listener(self.id, STATE_TYPE, handle)?;

        match self.fetch() {
            Ok(last) => {
                synchronizer.synchronize(last);
                debug!(id = %self.id, "State synchronized");
                Ok(Subscription { listener, live })
            }
            Err(e) => {
                self.connection
                    .remove_notification_listener(self.id, STATE_TYPE, listener);
                Err(e)
            }
        }
    }

    fn fetch(&self) -> Result<Vec<Notification>> {
        let value = self
            .connection
            .invoke(self.id, operations::STATE_SYNCHRONIZE, Value::Null)?;
        Ok(serde_json::from_value(value)?)
    }

    fn disconnect(&self, subscription: Subscription) {
        subscription.live.store(false, Ordering::SeqCst);
        self.connection
            .remove_notification_listener(self.id, STATE_TYPE, subscription.listener);
    }

    /// Disconnect and tell remaining listeners the proxy is gone.
    pub(crate) fn destroy(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            self.disconnect(subscription);
        }
        self.shared
            .publish(StateEvent::new(self.shared.name.clone(), JobState::Destroyed));
    }
}

impl Stateful for ClientStateHandler {
    fn add_state_listener(&self, listener: StateListener) -> ListenerId {
        let mut subscription = self.subscription.lock();
        if subscription.is_none() {
            match self.connect() {
                Ok(s) => *subscription = Some(s),
                Err(e) => error!(id = %self.id, "Failed to synchronize state: {}", e),
            }
        }
        drop(subscription);
        let _delivery = self.shared.delivery.lock();
        let id = self.shared.listeners.add(listener.clone());
        let last = self.shared.last.lock().clone();
        listener(&last);
        id
    }

    fn remove_state_listener(&self, id: ListenerId) {
        let mut subscription = self.subscription.lock();
        self.shared.listeners.remove(id);
        if self.shared.listeners.is_empty() {
            if let Some(subscription) = subscription.take() {
                self.disconnect(subscription);
            }
        }
    }

    /// Without listeners the mirror is not kept current, so the remote
    /// state is fetched directly.
    fn last_state_event(&self) -> StateEvent {
        if !self.is_connected() {
            match self.fetch().map(|last| last.last().map(|n| self.shared.event_from(n))) {
                Ok(Some(Ok(event))) => return event,
                Ok(_) => {}
                Err(e) => debug!(id = %self.id, "Could not fetch state: {}", e),
            }
        }
        self.shared.last.lock().clone()
    }
}
