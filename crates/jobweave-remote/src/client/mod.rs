//! The mirroring side.
//!
//! A [`LocalClientSession`] creates [`ClientProxy`] jobs for remote ids.
//! A proxy mirrors the remote job's state and children lazily: nothing is
//! fetched until the first listener is added, and the subscription is
//! released with the last one.

mod state;
mod structural;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use jobweave_protocols::{
    Describable, Job, JobError, LogEnabled, Resettable, Stateful, Stoppable, Structural,
};

use crate::connection::{operations, Connection, Description};
use crate::error::Result;
use crate::notification::RemoteId;

pub use self::state::ClientStateHandler;
pub use self::structural::ClientStructuralHandler;

/// Creates and destroys proxies over one connection.
pub struct LocalClientSession {
    connection: Arc<dyn Connection>,
    proxies: DashMap<RemoteId, Arc<ClientProxy>>,
    this: Weak<LocalClientSession>,
}

impl LocalClientSession {
    pub fn new(connection: Arc<dyn Connection>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            connection,
            proxies: DashMap::new(),
            this: this.clone(),
        })
    }

    /// A proxy for the remote root.
    pub fn root(&self) -> Option<Arc<ClientProxy>> {
        self.create(RemoteId::ROOT)
    }

    /// A proxy for `id`, or `None` if the remote object can not be
    /// described. The same proxy is returned while it is alive.
    pub fn create(&self, id: RemoteId) -> Option<Arc<ClientProxy>> {
        if let Some(existing) = self.proxies.get(&id) {
            return Some(existing.clone());
        }
        let description = match self.describe(id) {
            Ok(description) => description,
            Err(e) => {
                warn!(%id, "Failed to create proxy: {}", e);
                return None;
            }
        };
        let proxy = Arc::new(ClientProxy::new(id, description, self.connection.clone(), self.this.clone()));
        debug!(%id, name = %proxy.name, "Proxy created");
        Some(self.proxies.entry(id).or_insert(proxy).clone())
    }

    fn describe(&self, id: RemoteId) -> Result<Description> {
        let value = self.connection.invoke(id, operations::DESCRIBE, Value::Null)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Destroy a proxy, releasing its own subscriptions and children.
    pub fn destroy(&self, proxy: &Arc<ClientProxy>) {
        self.proxies.remove_if(&proxy.id, |_, p| Arc::ptr_eq(p, proxy));
        proxy.destroy();
    }

    /// Number of live proxies.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}

/// A local stand-in for a remote job.
pub struct ClientProxy {
    id: RemoteId,
    name: String,
    connection: Arc<dyn Connection>,
    state: Option<ClientStateHandler>,
    structural: Option<ClientStructuralHandler>,
    stoppable: bool,
    resettable: bool,
    /// The remote logger, fetched once when the proxy is created.
    logger_name: Option<String>,
    destroyed: AtomicBool,
}

impl ClientProxy {
    fn new(
        id: RemoteId,
        description: Description,
        connection: Arc<dyn Connection>,
        session: Weak<LocalClientSession>,
    ) -> Self {
        let name = description.name;
        let logger_name = if description.log_enabled {
            fetch_logger_name(id, connection.as_ref())
        } else {
            None
        };
        Self {
            id,
            state: description
                .stateful
                .then(|| ClientStateHandler::new(id, &name, connection.clone())),
            structural: description
                .structural
                .then(|| ClientStructuralHandler::new(id, &name, connection.clone(), session)),
            stoppable: description.stoppable,
            resettable: description.resettable,
            logger_name,
            destroyed: AtomicBool::new(false),
            connection,
            name,
        }
    }

    pub fn id(&self) -> RemoteId {
        self.id
    }

    pub fn structural_handler(&self) -> Option<&ClientStructuralHandler> {
        self.structural.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(structural) = &self.structural {
            structural.destroy();
        }
        if let Some(state) = &self.state {
            state.destroy();
        }
        debug!(id = %self.id, name = %self.name, "Proxy destroyed");
    }

    fn call(&self, operation: &str) -> Result<Value> {
        self.connection.invoke(self.id, operation, Value::Null)
    }

    /// The remote job's properties, fetched on every call.
    pub fn properties(&self) -> Result<BTreeMap<String, String>> {
        Ok(serde_json::from_value(self.call(operations::PROPERTIES)?)?)
    }
}

fn fetch_logger_name(id: RemoteId, connection: &dyn Connection) -> Option<String> {
    match connection.invoke(id, operations::LOGGER_NAME, Value::Null) {
        Ok(Value::String(name)) => Some(name),
        Ok(other) => {
            warn!(%id, "Unexpected logger name {}", other);
            None
        }
        Err(e) => {
            warn!(%id, "Failed to fetch logger name: {}", e);
            None
        }
    }
}

impl Job for ClientProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> std::result::Result<(), JobError> {
        self.call(operations::RUN)?;
        Ok(())
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        self.state.as_ref().map(|s| s as &dyn Stateful)
    }

    fn as_structural(&self) -> Option<&dyn Structural> {
        self.structural.as_ref().map(|s| s as &dyn Structural)
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        self.stoppable.then_some(self as &dyn Stoppable)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        self.resettable.then_some(self as &dyn Resettable)
    }

    fn as_describable(&self) -> Option<&dyn Describable> {
        Some(self)
    }

    fn as_log_enabled(&self) -> Option<&dyn LogEnabled> {
        self.logger_name.is_some().then_some(self as &dyn LogEnabled)
    }
}

impl Describable for ClientProxy {
    /// Empty when the remote side can not be reached.
    fn describe(&self) -> BTreeMap<String, String> {
        self.properties().unwrap_or_else(|e| {
            warn!(id = %self.id, "Describe failed: {}", e);
            BTreeMap::new()
        })
    }
}

impl LogEnabled for ClientProxy {
    fn logger_name(&self) -> String {
        self.logger_name.clone().unwrap_or_default()
    }
}

impl Stoppable for ClientProxy {
    fn stop(&self) -> std::result::Result<(), JobError> {
        self.call(operations::STOP)?;
        Ok(())
    }
}

impl Resettable for ClientProxy {
    fn soft_reset(&self) -> bool {
        self.call(operations::SOFT_RESET)
            .map(|v| v.as_bool().unwrap_or(false))
            .unwrap_or_else(|e| {
                warn!(id = %self.id, "Soft reset failed: {}", e);
                false
            })
    }

    fn hard_reset(&self) -> bool {
        self.call(operations::HARD_RESET)
            .map(|v| v.as_bool().unwrap_or(false))
            .unwrap_or_else(|e| {
                warn!(id = %self.id, "Hard reset failed: {}", e);
                false
            })
    }
}

impl fmt::Debug for ClientProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProxy")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
