//! Mirrors the children of a remote structural job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error};

use jobweave_core::ChildHelper;
use jobweave_protocols::{ListenerId, Structural, StructuralListener};

use crate::child_match::{ChildMatch, ChildOps};
use crate::connection::{operations, Connection};
use crate::error::Result;
use crate::notification::{ChildData, Notification, RemoteId, STRUCTURAL_TYPE};
use crate::synchronizer::Synchronizer;

use super::{ClientProxy, LocalClientSession};

/// The mirrored list. `proxies` is parallel to the ids; a `None` is an id
/// whose proxy could not be created and so is missing from the helper.
#[derive(Default)]
struct Mirror {
    ids: ChildMatch<RemoteId>,
    proxies: Vec<Option<Arc<ClientProxy>>>,
}

struct MirrorOps<'a> {
    proxies: &'a mut Vec<Option<Arc<ClientProxy>>>,
    helper: &'a ChildHelper,
    session: Option<Arc<LocalClientSession>>,
}

impl MirrorOps<'_> {
    /// Position in the helper of the mirror slot at `index`.
    fn position(&self, index: usize) -> usize {
        self.proxies[..index].iter().flatten().count()
    }
}

impl ChildOps<RemoteId> for MirrorOps<'_> {
    fn insert_child(&mut self, index: usize, child: &RemoteId) {
        let proxy = self.session.as_ref().and_then(|s| s.create(*child));
        let position = self.position(index);
        self.proxies.insert(index, proxy.clone());
        if let Some(proxy) = proxy {
            self.helper.insert_child(position, proxy);
        }
    }

    fn remove_child_at(&mut self, index: usize) {
        let position = self.position(index);
        if let Some(proxy) = self.proxies.remove(index) {
            self.helper.remove_child_at(position);
            if let Some(session) = &self.session {
                session.destroy(&proxy);
            }
        }
    }
}

struct Subscription {
    listener: ListenerId,
    live: Arc<AtomicBool>,
}

pub struct ClientStructuralHandler {
    id: RemoteId,
    connection: Arc<dyn Connection>,
    session: Weak<LocalClientSession>,
    helper: Arc<ChildHelper>,
    mirror: Arc<Mutex<Mirror>>,
    subscription: Mutex<Option<Subscription>>,
}

impl ClientStructuralHandler {
    pub(crate) fn new(
        id: RemoteId,
        name: &str,
        connection: Arc<dyn Connection>,
        session: Weak<LocalClientSession>,
    ) -> Self {
        Self {
            id,
            connection,
            session,
            helper: Arc::new(ChildHelper::new(name)),
            mirror: Arc::new(Mutex::new(Mirror::default())),
            subscription: Mutex::new(None),
        }
    }

    /// Add a listener, connecting to the remote children first if this is
    /// the first one. Fails if the current children cannot be fetched.
    pub fn try_add_structural_listener(&self, listener: Arc<dyn StructuralListener>) -> Result<ListenerId> {
        let mut subscription = self.subscription.lock();
        if subscription.is_none() {
            *subscription = Some(self.connect()?);
        }
        Ok(self.helper.add_structural_listener(listener))
    }

    /// Mirrored children, in remote order.
    pub fn children(&self) -> Vec<Arc<ClientProxy>> {
        self.mirror.lock().proxies.iter().flatten().cloned().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.lock().is_some()
    }

    fn connect(&self) -> Result<Subscription> {
        let live = Arc::new(AtomicBool::new(true));
        let on_notification = {
            let live = live.clone();
            let helper = self.helper.clone();
            let mirror = self.mirror.clone();
            let session = self.session.clone();
            move |notification: &Notification| {
                if live.load(Ordering::SeqCst) {
                    apply(notification, &helper, &mirror, session.upgrade());
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
            .add_notification_listener(self.id, STRUCTURAL_TYPE, handle)?;

        let last = self
            .connection
            .invoke(self.id, operations::STRUCTURAL_SYNCHRONIZE, Value::Null)
            .and_then(|value| Ok(serde_json::from_value::<Vec<Notification>>(value)?));
        match last {
            Ok(last) => {
                synchronizer.synchronize(last);
                debug!(id = %self.id, "Children synchronized");
                Ok(Subscription { listener, live })
            }
            Err(e) => {
                self.connection
                    .remove_notification_listener(self.id, STRUCTURAL_TYPE, listener);
                Err(e)
            }
        }
    }

    fn disconnect(&self, subscription: Subscription) {
        self.connection
            .remove_notification_listener(self.id, STRUCTURAL_TYPE, subscription.listener);
        let mut mirror = self.mirror.lock();
        subscription.live.store(false, Ordering::SeqCst);
        // Proxies are destroyed explicitly, last first.
        let Mirror { ids, proxies } = &mut *mirror;
        ids.apply(
            &[],
            &mut MirrorOps {
                proxies,
                helper: &self.helper,
                session: self.session.upgrade(),
            },
        );
        debug!(id = %self.id, "Children released");
    }

    /// Disconnect and destroy every mirrored child.
    pub(crate) fn destroy(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            self.disconnect(subscription);
        }
    }
}

fn apply(
    notification: &Notification,
    helper: &ChildHelper,
    mirror: &Mutex<Mirror>,
    session: Option<Arc<LocalClientSession>>,
) {
    let data: ChildData = match notification.payload() {
        Ok(data) => data,
        Err(e) => {
            error!(source = %notification.source, "Bad structural notification: {}", e);
            return;
        }
    };
    let mut mirror = mirror.lock();
    let Mirror { ids, proxies } = &mut *mirror;
    ids.apply(&data.children, &mut MirrorOps { proxies, helper, session });
}

impl Structural for ClientStructuralHandler {
    fn add_structural_listener(&self, listener: Arc<dyn StructuralListener>) -> ListenerId {
        match self.try_add_structural_listener(listener.clone()) {
            Ok(id) => id,
            Err(e) => {
                // Listen anyway; the next listener retries the connection.
                error!(id = %self.id, "Failed to synchronize children: {}", e);
                self.helper.add_structural_listener(listener)
            }
        }
    }

    fn remove_structural_listener(&self, id: ListenerId) {
        let mut subscription = self.subscription.lock();
        self.helper.remove_structural_listener(id);
        if self.helper.has_no_listeners() {
            if let Some(subscription) = subscription.take() {
                self.disconnect(subscription);
            }
        }
    }
}
