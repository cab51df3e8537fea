//! # jobweave Protocols
//!
//! Core protocol definitions for the jobweave framework.
//! Contains the state lattice, events and job capability traits - no
//! implementations.
//!
//! ## Core Types
//!
//! - [`JobState`] / [`ParentState`] / [`State`] - The state lattice
//! - [`StateEvent`] - An immutable record of a state transition
//! - [`Job`] - Base trait for anything that can be run
//! - [`Stateful`] - Jobs that publish state transitions
//! - [`Structural`] - Jobs with a dynamic list of children
//! - [`Stoppable`] / [`Resettable`] - Optional job capabilities
//! - [`Describable`] / [`LogEnabled`] - Optional display capabilities

pub mod error;
pub mod event;
pub mod job;
pub mod state;

pub use error::{JobError, StateLockError, StateOperatorError};
pub use event::{ListenerId, StateEvent, StateListener, StructuralEvent, StructuralListener};
pub use job::{
    same_job, Describable, Job, LogEnabled, Resettable, Stateful, Stoppable, Structural,
};
pub use state::{JobState, ParentState, State};
