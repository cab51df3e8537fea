//! # jobweave Core
//!
//! State propagation for jobweave jobs.
//!
//! ## Components
//!
//! - [`StateHandler`] - Per-job transition guard and state publisher
//! - [`StateAggregator`] - Reduces child states to one parent state
//! - [`ChildHelper`] - Ordered, observable child list
//! - [`ChildStateReflector`] - Mirrors aggregated child state into a parent
//! - [`jobs`] - `FnJob`, `SequentialJob` and `ForEachJob`
//! - [`LifecycleManager`] - Ordered startup and graceful shutdown

pub mod aggregator;
pub mod child_helper;
pub mod conditions;
pub mod interrupt;
pub mod jobs;
pub mod lifecycle;
pub mod listeners;
pub mod operators;
pub mod reflector;
pub mod state_handler;
pub mod stop_wait;

pub use aggregator::StateAggregator;
pub use child_helper::ChildHelper;
pub use conditions::StateCondition;
pub use jobs::{ChildFactory, ChildHandle, FnJob, ForEachJob, JobContext, Outcome, SequentialJob};
pub use lifecycle::{
    JobLifecycleHook, LifecycleError, LifecycleHook, LifecycleManager, LifecycleState,
    ShutdownSignal,
};
pub use listeners::{ListenerRegistry, OneShot};
pub use operators::{AnyActiveStateOp, ServiceManagerStateOp, StateOperator, WorstStateOp};
pub use reflector::ChildStateReflector;
pub use state_handler::{default_lock_timeout, set_default_lock_timeout, LatticeState, StateHandler};
pub use stop_wait::{wait_for_stop, DEFAULT_STOP_TIMEOUT};
