//! Notifications and their payloads.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use jobweave_protocols::State;

use crate::error::Result;

/// Identifies an exported object within one server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub u64);

impl RemoteId {
    /// Reserved for the root of an exported tree.
    pub const ROOT: RemoteId = RemoteId(0);
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural changes of an exported object.
pub const STRUCTURAL_TYPE: &str = "jobweave.structural";
/// State changes of an exported object.
pub const STATE_TYPE: &str = "jobweave.state";

/// One record on a notification channel. `sequence` increases per
/// `(source, kind)` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub source: RemoteId,
    pub kind: String,
    pub sequence: u64,
    pub data: Value,
}

impl Notification {
    pub fn new<T: Serialize>(source: RemoteId, kind: &str, sequence: u64, data: &T) -> Result<Self> {
        Ok(Self {
            source,
            kind: kind.to_string(),
            sequence,
            data: serde_json::to_value(data)?,
        })
    }

    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Receives notifications from one channel, in emission order.
pub type NotificationListener = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Payload of a structural notification: the full ordered membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildData {
    pub children: Vec<RemoteId>,
}

/// Payload of a state notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    pub state: State,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}
