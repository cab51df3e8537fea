//! Catch-up for listeners that attach after notifications were sent.
//!
//! A [`Synchronizer`] is registered on a channel before the current
//! snapshot is fetched. Anything arriving in between is buffered. Once
//! [`Synchronizer::synchronize`] is given the snapshot it delivers it,
//! then the buffered notifications the snapshot does not already cover,
//! and from then on passes notifications straight through.

use parking_lot::Mutex;
use tracing::debug;

use crate::notification::{Notification, NotificationListener};

enum Phase {
    Buffering(Vec<Notification>),
    Live,
}

pub struct Synchronizer {
    listener: NotificationListener,
    // Delivery happens under this lock so order is kept across threads.
    phase: Mutex<Phase>,
}

impl Synchronizer {
    pub fn new(listener: NotificationListener) -> Self {
        Self {
            listener,
            phase: Mutex::new(Phase::Buffering(Vec::new())),
        }
    }

    /// Handle a notification from the channel.
    pub fn handle(&self, notification: &Notification) {
        let mut phase = self.phase.lock();
        match &mut *phase {
            Phase::Buffering(pending) => pending.push(notification.clone()),
            Phase::Live => (self.listener)(notification),
        }
    }

    /// Deliver the snapshot and whatever arrived after it.
    pub fn synchronize(&self, last: Vec<Notification>) {
        let mut phase = self.phase.lock();
        let pending = match std::mem::replace(&mut *phase, Phase::Live) {
            Phase::Buffering(pending) => pending,
            Phase::Live => {
                debug!("Already synchronized");
                return;
            }
        };
        let covered = last.iter().map(|n| n.sequence).max().unwrap_or(0);
        for notification in &last {
            (self.listener)(notification);
        }
        for notification in pending.iter().filter(|n| n.sequence > covered) {
            (self.listener)(notification);
        }
    }

    pub fn is_synchronized(&self) -> bool {
        matches!(*self.phase.lock(), Phase::Live)
    }
}
