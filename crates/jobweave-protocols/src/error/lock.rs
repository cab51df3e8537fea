//! Transition guard errors.

use std::time::Duration;

use thiserror::Error;

/// Failures acquiring a per-entity transition guard.
///
/// The three variants are deliberately distinct so callers can tell a
/// timeout from an interrupt from a non-blocking refusal.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StateLockError {
    /// The guard could not be acquired within the configured bound.
    #[error("Timed out after {0:?} waiting for the state lock")]
    Timeout(Duration),

    /// The waiting thread was interrupted. The thread's interrupt flag is
    /// left raised.
    #[error("Interrupted while waiting for the state lock")]
    Interrupted,

    /// Another thread holds the guard (non-blocking attempts only).
    #[error("State lock is held by another thread")]
    Locked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_errors_are_distinct() {
        let timeout = StateLockError::Timeout(Duration::from_millis(5));
        assert_ne!(timeout, StateLockError::Interrupted);
        assert_ne!(StateLockError::Locked, StateLockError::Interrupted);
        assert!(timeout.to_string().contains("5ms"));
    }
}
