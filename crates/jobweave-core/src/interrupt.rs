//! Cooperative thread interrupt flags.
//!
//! Each thread owns a flag that other threads can raise through an
//! [`Interrupter`]. Blocking operations in this crate poll the flag of the
//! waiting thread and give up with an `Interrupted` error, leaving the flag
//! raised so the caller can observe it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};

struct InterruptFlag {
    raised: AtomicBool,
    thread: Thread,
}

thread_local! {
    static CURRENT: Arc<InterruptFlag> = Arc::new(InterruptFlag {
        raised: AtomicBool::new(false),
        thread: thread::current(),
    });
}

/// Handle used to interrupt a particular thread.
#[derive(Clone)]
pub struct Interrupter {
    flag: Arc<InterruptFlag>,
}

impl Interrupter {
    /// Raise the target thread's flag and wake it if parked.
    pub fn interrupt(&self) {
        self.flag.raised.store(true, Ordering::SeqCst);
        self.flag.thread.unpark();
    }

    /// Check the target thread's flag without clearing it.
    pub fn is_interrupted(&self) -> bool {
        self.flag.raised.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupter")
            .field("thread", &self.flag.thread.name())
            .field("raised", &self.is_interrupted())
            .finish()
    }
}

/// Get an interrupter for the calling thread.
pub fn current() -> Interrupter {
    CURRENT.with(|flag| Interrupter { flag: flag.clone() })
}

/// Raise the calling thread's own flag.
pub fn interrupt_current() {
    current().interrupt();
}

/// Check the calling thread's flag without clearing it.
pub fn is_interrupted() -> bool {
    CURRENT.with(|flag| flag.raised.load(Ordering::SeqCst))
}

/// Check and clear the calling thread's flag.
pub fn interrupted() -> bool {
    CURRENT.with(|flag| flag.raised.swap(false, Ordering::SeqCst))
}
