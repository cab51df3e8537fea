//! A one-shot gate.

use parking_lot::{Condvar, Mutex};

/// Closed until released, then open for good. Waiters block until then.
#[derive(Debug, Default)]
pub struct Latch {
    open: Mutex<bool>,
    signal: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        *self.open.lock() = true;
        self.signal.notify_all();
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.signal.wait(&mut open);
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }
}

/// Releases a latch when dropped, so early returns cannot leave waiters
/// blocked.
pub struct ReleaseOnDrop<'a>(pub &'a Latch);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_waiter_blocks_until_release() {
        let latch = Arc::new(Latch::new());
        let l = latch.clone();
        let waiter = thread::spawn(move || {
            l.wait();
            l.is_open()
        });

        thread::sleep(Duration::from_millis(20));
        assert!(!latch.is_open());
        latch.release();

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_release_on_drop() {
        let latch = Latch::new();
        {
            let _release = ReleaseOnDrop(&latch);
        }
        latch.wait();
        assert!(latch.is_open());
    }
}
