//! The exporting side.
//!
//! A [`ServerSession`] gives every exported job a [`RemoteId`], follows
//! its state and children and answers operations invoked through the
//! [`Connection`] trait. Children of an exported structural job are
//! exported as they are added and destroyed as they are removed.

mod state;
mod structural;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use jobweave_protocols::{same_job, Job, ListenerId};

use crate::bus::NotificationBus;
use crate::connection::{operations, Connection, Description};
use crate::error::{RemoteError, Result};
use crate::notification::{NotificationListener, RemoteId};

use self::state::ServerStateHandler;
use self::structural::ServerStructuralHandler;

struct Exported {
    id: RemoteId,
    /// The exported parent whose child this is.
    parent: Option<RemoteId>,
    job: Arc<dyn Job>,
    structural: Option<Arc<ServerStructuralHandler>>,
    state: Option<ServerStateHandler>,
}

impl Exported {
    fn describe(&self) -> Description {
        Description {
            name: self.job.name().to_string(),
            stateful: self.state.is_some(),
            structural: self.structural.is_some(),
            stoppable: self.job.as_stoppable().is_some(),
            resettable: self.job.as_resettable().is_some(),
            log_enabled: self.job.as_log_enabled().is_some(),
        }
    }

    /// The job's own description, or its name and state when it has none.
    fn properties(&self) -> BTreeMap<String, String> {
        if let Some(describable) = self.job.as_describable() {
            return describable.describe();
        }
        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), self.job.name().to_string());
        if let Some(stateful) = self.job.as_stateful() {
            properties.insert("state".to_string(), stateful.last_state_event().state.to_string());
        }
        properties
    }

    fn destroy(&self) {
        if let Some(structural) = &self.structural {
            structural.destroy(self.job.as_structural());
        }
        if let Some(state) = &self.state {
            state.destroy(self.job.as_stateful());
        }
    }

    fn invoke(&self, operation: &str) -> Result<Value> {
        let unknown = || RemoteError::UnknownOperation {
            id: self.id,
            operation: operation.to_string(),
        };
        let fault = |e: jobweave_protocols::JobError| RemoteError::Fault(e.to_string());
        match operation {
            operations::DESCRIBE => Ok(serde_json::to_value(self.describe())?),
            operations::PROPERTIES => Ok(serde_json::to_value(self.properties())?),
            operations::LOGGER_NAME => {
                let log_enabled = self.job.as_log_enabled().ok_or_else(unknown)?;
                Ok(Value::String(log_enabled.logger_name()))
            }
            operations::STRUCTURAL_SYNCHRONIZE => {
                let handler = self.structural.as_ref().ok_or_else(unknown)?;
                Ok(serde_json::to_value(handler.last_notifications()?)?)
            }
            operations::STATE_SYNCHRONIZE => {
                let handler = self.state.as_ref().ok_or_else(unknown)?;
                Ok(serde_json::to_value(handler.last_notifications()?)?)
            }
            operations::RUN => {
                self.job.run().map_err(fault)?;
                Ok(Value::Null)
            }
            operations::STOP => {
                self.job.as_stoppable().ok_or_else(unknown)?.stop().map_err(fault)?;
                Ok(Value::Null)
            }
            operations::SOFT_RESET => {
                Ok(Value::Bool(self.job.as_resettable().ok_or_else(unknown)?.soft_reset()))
            }
            operations::HARD_RESET => {
                Ok(Value::Bool(self.job.as_resettable().ok_or_else(unknown)?.hard_reset()))
            }
            _ => Err(unknown()),
        }
    }
}

pub(crate) struct SessionInner {
    pub(crate) bus: Arc<NotificationBus>,
    objects: DashMap<RemoteId, Arc<Exported>>,
    next_id: AtomicU64,
}

impl SessionInner {
    /// Whether `job` is `parent` or one of its exported ancestors.
    fn in_ancestry(&self, mut parent: Option<RemoteId>, job: &Arc<dyn Job>) -> bool {
        while let Some(id) = parent {
            let Some(exported) = self.objects.get(&id).map(|e| e.clone()) else {
                return false;
            };
            if same_job(&exported.job, job) {
                return true;
            }
            parent = exported.parent;
        }
        false
    }

    fn export_as(
        self: &Arc<Self>,
        id: RemoteId,
        parent: Option<RemoteId>,
        job: Arc<dyn Job>,
    ) -> Result<RemoteId> {
        if self.in_ancestry(parent, &job) {
            return Err(RemoteError::Loopback(job.name().to_string()));
        }
        let exported = Arc::new(Exported {
            id,
            parent,
            structural: job
                .as_structural()
                .map(|_| ServerStructuralHandler::new(id, job.name(), Arc::downgrade(self))),
            state: job
                .as_stateful()
                .map(|_| ServerStateHandler::new(id, self.bus.clone())),
            job,
        });
        // Registered before following children so their ancestry can be
        // walked back through this job.
        self.objects.insert(id, exported.clone());
        if let (Some(handler), Some(stateful)) = (&exported.state, exported.job.as_stateful()) {
            handler.attach(stateful);
        }
        if let (Some(handler), Some(structural)) = (&exported.structural, exported.job.as_structural()) {
            handler.attach(structural);
        }
        debug!(%id, name = exported.job.name(), "Exported");
        Ok(id)
    }

    pub(crate) fn export(self: &Arc<Self>, parent: Option<RemoteId>, job: Arc<dyn Job>) -> Result<RemoteId> {
        let id = RemoteId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.export_as(id, parent, job)
    }

    pub(crate) fn destroy(&self, id: RemoteId) -> bool {
        let Some((_, exported)) = self.objects.remove(&id) else {
            return false;
        };
        exported.destroy();
        self.bus.forget(id);
        debug!(%id, name = exported.job.name(), "Destroyed");
        true
    }

    fn get(&self, id: RemoteId) -> Result<Arc<Exported>> {
        self.objects
            .get(&id)
            .map(|e| e.clone())
            .ok_or(RemoteError::NoSuchObject(id))
    }
}

/// Exports a tree of jobs in process.
pub struct ServerSession {
    inner: Arc<SessionInner>,
}

impl ServerSession {
    pub fn new() -> Self {
        Self::with_bus(Arc::new(NotificationBus::new()))
    }

    pub fn with_bus(bus: Arc<NotificationBus>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                bus,
                objects: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Export `job` as the root of this session, id 0.
    pub fn export_root(&self, job: Arc<dyn Job>) -> Result<RemoteId> {
        if self.inner.objects.contains_key(&RemoteId::ROOT) {
            self.inner.destroy(RemoteId::ROOT);
        }
        info!(name = job.name(), "Exporting root");
        self.inner.export_as(RemoteId::ROOT, None, job)
    }

    /// Export a job outside the root tree.
    pub fn export(&self, job: Arc<dyn Job>) -> Result<RemoteId> {
        self.inner.export(None, job)
    }

    /// Destroy an exported object and, for structural jobs, its exported
    /// descendants.
    pub fn destroy(&self, id: RemoteId) -> bool {
        self.inner.destroy(id)
    }

    /// The id `job` is exported under. A job exported in more than one
    /// place answers with any one of its ids.
    pub fn id_of(&self, job: &Arc<dyn Job>) -> Option<RemoteId> {
        self.inner
            .objects
            .iter()
            .find(|e| same_job(&e.job, job))
            .map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.inner.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.objects.is_empty()
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.inner.bus
    }

    /// Destroy everything, root first, then close the channel.
    pub fn close(&self) {
        self.inner.destroy(RemoteId::ROOT);
        let remaining: Vec<RemoteId> = self.inner.objects.iter().map(|e| e.id).collect();
        for id in remaining {
            self.inner.destroy(id);
        }
        self.inner.bus.close();
        info!("Server session closed");
    }
}

impl Default for ServerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for ServerSession {
    fn invoke(&self, id: RemoteId, operation: &str, _args: Value) -> Result<Value> {
        debug!(%id, operation, "Invoke");
        self.inner.get(id)?.invoke(operation)
    }

    fn add_notification_listener(
        &self,
        id: RemoteId,
        kind: &str,
        listener: NotificationListener,
    ) -> Result<ListenerId> {
        self.inner.get(id)?;
        self.inner.bus.add_listener(id, kind, listener)
    }

    fn remove_notification_listener(&self, id: RemoteId, kind: &str, listener: ListenerId) {
        self.inner.bus.remove_listener(id, kind, listener);
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
