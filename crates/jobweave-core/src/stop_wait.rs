//! Waiting for a stopped job to settle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use jobweave_protocols::{JobError, StateEvent, Stateful};

/// How long [`wait_for_stop`] waits by default.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Block until `stateful` leaves every stoppable state.
///
/// Fails with [`JobError::FailedToStop`] if it is still running after
/// `timeout`.
pub fn wait_for_stop(name: &str, stateful: &dyn Stateful, timeout: Duration) -> Result<(), JobError> {
    let settled = Arc::new((Mutex::new(false), Condvar::new()));
    let signal = settled.clone();
    let id = stateful.add_state_listener(Arc::new(move |event: &StateEvent| {
        if !event.state.is_stoppable() {
            let (lock, cvar) = &*signal;
            *lock.lock() = true;
            cvar.notify_all();
        }
    }));

    let (lock, cvar) = &*settled;
    let mut done = lock.lock();
    if !*done {
        cvar.wait_while_for(&mut done, |d| !*d, timeout);
    }
    let stopped = *done;
    drop(done);
    stateful.remove_state_listener(id);

    if stopped {
        Ok(())
    } else {
        Err(JobError::FailedToStop {
            name: name.to_string(),
            reason: format!(
                "still {} after {:?}",
                stateful.last_state_event().state,
                timeout
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_handler::StateHandler;
    use jobweave_protocols::JobState;
    use std::thread;

    #[test]
    fn test_already_stopped() {
        let handler = StateHandler::<JobState>::new("job");
        assert!(wait_for_stop("job", &handler, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_times_out() {
        let handler = StateHandler::<JobState>::new("job");
        handler.change_state(JobState::Executing).unwrap();

        let err = wait_for_stop("job", &handler, Duration::from_millis(30)).unwrap_err();

        assert!(matches!(err, JobError::FailedToStop { .. }));
        assert_eq!(handler.listener_count(), 0);
    }

    #[test]
    fn test_wakes_on_terminal_state() {
        let handler = Arc::new(StateHandler::<JobState>::new("job"));
        handler.change_state(JobState::Executing).unwrap();

        let h = handler.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            h.change_state(JobState::Incomplete).unwrap();
        });

        assert!(wait_for_stop("job", handler.as_ref(), Duration::from_secs(5)).is_ok());
        stopper.join().unwrap();
    }
}
