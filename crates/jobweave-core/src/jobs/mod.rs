//! Ready-made jobs: a closure-backed leaf and two structural parents.

mod fn_job;
mod for_each;
mod sequential;
mod structural;

pub use fn_job::{FnJob, JobContext, Outcome};
pub use for_each::{ChildFactory, ChildHandle, ForEachJob};
pub use sequential::SequentialJob;
