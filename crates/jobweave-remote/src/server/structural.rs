//! Publishes the children of an exported structural job.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use jobweave_protocols::{Job, ListenerId, Structural, StructuralEvent, StructuralListener};

use crate::error::{RemoteError, Result};
use crate::notification::{ChildData, Notification, RemoteId, STRUCTURAL_TYPE};

use super::SessionInner;

pub(crate) struct ServerStructuralHandler {
    id: RemoteId,
    name: String,
    session: Weak<SessionInner>,
    /// One slot per child of the job. `None` is a child that could not be
    /// exported, such as a loopback; it never appears in a snapshot.
    children: Mutex<Vec<Option<RemoteId>>>,
    subscription: Mutex<Option<ListenerId>>,
}

struct Watcher(Weak<ServerStructuralHandler>);

impl StructuralListener for Watcher {
    fn child_added(&self, event: &StructuralEvent) {
        if let Some(handler) = self.0.upgrade() {
            handler.child_added(event.index, &event.child);
        }
    }

    fn child_removed(&self, event: &StructuralEvent) {
        if let Some(handler) = self.0.upgrade() {
            handler.child_removed(event.index);
        }
    }
}

impl ServerStructuralHandler {
    pub(crate) fn new(id: RemoteId, name: &str, session: Weak<SessionInner>) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: name.to_string(),
            session,
            children: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
        })
    }

    /// Start following the job. Existing children are exported at once.
    pub(crate) fn attach(self: &Arc<Self>, structural: &dyn Structural) {
        let id = structural.add_structural_listener(Arc::new(Watcher(Arc::downgrade(self))));
        *self.subscription.lock() = Some(id);
    }

    fn child_added(&self, index: usize, child: &Arc<dyn Job>) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        let exported = match session.export(Some(self.id), child.clone()) {
            Ok(id) => Some(id),
            Err(RemoteError::Loopback(name)) => {
                info!(parent = %self.name, "Server loopback detected for [{}]", name);
                None
            }
            Err(e) => {
                error!(parent = %self.name, "Failed creating child for [{}]: {}", child.name(), e);
                None
            }
        };
        let mut children = self.children.lock();
        let index = index.min(children.len());
        children.insert(index, exported);
        if exported.is_some() {
            self.publish(&session, &children);
        }
        debug!(parent = %self.name, child = child.name(), index, "Child added");
    }

    fn child_removed(&self, index: usize) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        let removed = {
            let mut children = self.children.lock();
            if index >= children.len() {
                warn!(parent = %self.name, index, "Removal of unknown child");
                return;
            }
            let removed = children.remove(index);
            // A child that was never exported was never announced.
            if removed.is_some() {
                self.publish(&session, &children);
            }
            removed
        };
        if let Some(child) = removed {
            session.destroy(child);
            debug!(parent = %self.name, %child, index, "Child removed");
        }
    }

    fn snapshot(children: &[Option<RemoteId>]) -> ChildData {
        ChildData {
            children: children.iter().flatten().copied().collect(),
        }
    }

    /// Send the full membership. Called with the children locked so
    /// notifications leave in sequence order.
    fn publish(&self, session: &SessionInner, children: &[Option<RemoteId>]) {
        let sequence = session.bus.next_sequence(self.id, STRUCTURAL_TYPE);
        match Notification::new(self.id, STRUCTURAL_TYPE, sequence, &Self::snapshot(children)) {
            Ok(notification) => session.bus.send(&notification),
            Err(e) => error!(parent = %self.name, "Failed to build notification: {}", e),
        }
    }

    /// The current membership, numbered as the last notification sent.
    pub(crate) fn last_notifications(&self) -> Result<Vec<Notification>> {
        let session = self.session.upgrade().ok_or(RemoteError::ChannelClosed)?;
        let children = self.children.lock();
        let sequence = session.bus.last_sequence(self.id, STRUCTURAL_TYPE);
        Ok(vec![Notification::new(
            self.id,
            STRUCTURAL_TYPE,
            sequence,
            &Self::snapshot(&children),
        )?])
    }

    /// Stop following the job and announce the removal of every child,
    /// last first, so mirrors empty out cleanly.
    pub(crate) fn destroy(&self, structural: Option<&dyn Structural>) {
        if let (Some(id), Some(structural)) = (self.subscription.lock().take(), structural) {
            structural.remove_structural_listener(id);
        }
        loop {
            let len = self.children.lock().len();
            if len == 0 {
                break;
            }
            self.child_removed(len - 1);
        }
    }
}
