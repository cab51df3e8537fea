//! Remote errors.

use thiserror::Error;

use jobweave_protocols::JobError;

use crate::notification::RemoteId;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The target was destroyed or never existed.
    #[error("No such remote object {0}")]
    NoSuchObject(RemoteId),

    #[error("Notification channel closed")]
    ChannelClosed,

    #[error("Remote object {id} has no operation '{operation}'")]
    UnknownOperation { id: RemoteId, operation: String },

    /// The object is already exported further up the same tree.
    #[error("Server loopback detected for [{0}]")]
    Loopback(String),

    #[error("Bad remote payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote operation itself failed.
    #[error("Remote fault: {0}")]
    Fault(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

impl From<RemoteError> for JobError {
    fn from(e: RemoteError) -> Self {
        JobError::Other(e.into())
    }
}
