//! What a client needs from the other side.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use jobweave_protocols::ListenerId;

use crate::error::Result;
use crate::notification::{NotificationListener, RemoteId};

/// Operation names understood by a server session.
pub mod operations {
    pub const DESCRIBE: &str = "describe";
    pub const STRUCTURAL_SYNCHRONIZE: &str = "structuralSynchronize";
    pub const STATE_SYNCHRONIZE: &str = "stateSynchronize";
    pub const RUN: &str = "run";
    pub const STOP: &str = "stop";
    pub const SOFT_RESET: &str = "softReset";
    pub const HARD_RESET: &str = "hardReset";
    pub const PROPERTIES: &str = "properties";
    pub const LOGGER_NAME: &str = "loggerName";
}

/// Invoke operations on remote objects and listen to their notifications.
pub trait Connection: Send + Sync {
    /// Fails with [`crate::RemoteError::NoSuchObject`] when the target is
    /// gone, distinct from other faults.
    fn invoke(&self, id: RemoteId, operation: &str, args: Value) -> Result<Value>;

    fn add_notification_listener(
        &self,
        id: RemoteId,
        kind: &str,
        listener: NotificationListener,
    ) -> Result<ListenerId>;

    fn remove_notification_listener(&self, id: RemoteId, kind: &str, listener: ListenerId);
}

/// Which capabilities an exported object has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub name: String,
    pub stateful: bool,
    pub structural: bool,
    pub stoppable: bool,
    pub resettable: bool,
    #[serde(default)]
    pub log_enabled: bool,
}
