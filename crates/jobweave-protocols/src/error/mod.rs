//! Error types for the jobweave protocol layer.

mod job;
mod lock;

pub use job::*;
pub use lock::*;
