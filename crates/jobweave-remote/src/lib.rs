//! Remote mirroring of jobweave jobs.
//!
//! The server side exports a job tree: each exported job gets a
//! [`RemoteId`] and publishes its state and its full child list as
//! [`Notification`]s. The client side rebuilds that tree as
//! [`ClientProxy`] jobs. A client that attaches late fetches the current
//! snapshot and catches up through a [`Synchronizer`]; each structural
//! notification carries the whole membership, which a [`ChildMatch`]
//! turns into inserts and removals.

pub mod bus;
pub mod child_match;
pub mod client;
pub mod connection;
pub mod error;
pub mod notification;
pub mod server;
pub mod synchronizer;

pub use bus::NotificationBus;
pub use child_match::{ChildMatch, ChildOps};
pub use client::{ClientProxy, ClientStateHandler, ClientStructuralHandler, LocalClientSession};
pub use connection::{operations, Connection, Description};
pub use error::{RemoteError, Result};
pub use notification::{
    ChildData, Notification, NotificationListener, RemoteId, StateData, STATE_TYPE, STRUCTURAL_TYPE,
};
pub use server::ServerSession;
pub use synchronizer::Synchronizer;
