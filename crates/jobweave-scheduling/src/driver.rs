//! The recurring schedule driver shared by [`crate::Timer`] and
//! [`crate::Retry`].
//!
//! A driver owns one child job. It asks its schedule when the child is next
//! due, arms a deferred execution through a [`ScheduledExecutor`], runs the
//! child when due and, once the child reaches a terminal state, asks its
//! [`SchedulePolicy`] where to schedule from next. When nothing further is
//! due the driver reflects its child's state.
//!
//! States: `READY -> EXECUTING`, then `STARTED` while waiting for the next
//! due date and `ACTIVE` while the child runs, cycling between the two.
//! Once the schedule is exhausted the driver reflects its child
//! (`COMPLETE` if the child never left `READY`). `stop()` returns the
//! driver to `READY`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, error, info, warn};

use jobweave_core::{
    wait_for_stop, ChildHelper, ChildStateReflector, OneShot, StateAggregator, StateCondition,
    StateHandler, DEFAULT_STOP_TIMEOUT,
};
use jobweave_protocols::{
    Describable, Job, JobError, ListenerId, LogEnabled, ParentState, Resettable, State,
    StateEvent, StateLockError, Stateful, Stoppable, Structural,
};

use crate::clock::{Clock, DefaultClock};
use crate::context::{parse_time_zone, utc_offset, ContextData, ScheduleContext};
use crate::error::{Result, ScheduleError};
use crate::executor::{ScheduledExecutor, ScheduledHandle};
use crate::interval::{Interval, ScheduleResult};
use crate::latch::{Latch, ReleaseOnDrop};
use crate::schedule::Schedule;

const STOP_POLL: Duration = Duration::from_millis(20);

/// What varies between kinds of driver.
pub trait SchedulePolicy: Send + Sync + 'static {
    /// Used in log messages.
    fn kind(&self) -> &'static str;

    /// Limits passed to every schedule evaluation.
    fn limits(&self) -> Option<Interval> {
        None
    }

    /// Prepare the child before each execution.
    fn reset_child(&self, child: &dyn Resettable);

    /// Where to evaluate the schedule from after the child finished in
    /// `state`. `None` ends the schedule.
    fn reschedule_on(
        &self,
        state: State,
        current: Option<&ScheduleResult>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>>;
}

/// Accepts the interval a parent driver is working to.
trait LimitsTarget: Send + Sync {
    fn set_limits(&self, limits: Option<Interval>);
}

/// Bookkeeping shared by the caller, the executor and the child's
/// listener. Never held while acquiring a transition guard.
#[derive(Default)]
struct Timing {
    context: ContextData,
    current: Option<ScheduleResult>,
    next_due: Option<DateTime<Utc>>,
    last_due: Option<DateTime<Utc>>,
    executions: u64,
    pending: Option<Arc<dyn ScheduledHandle>>,
    subscription: Option<(ListenerId, Arc<OneShot<State>>)>,
    stop: bool,
}

struct Inner<P> {
    name: String,
    policy: P,
    handler: Arc<StateHandler<ParentState>>,
    children: ChildHelper,
    aggregator: StateAggregator,
    reflector: ChildStateReflector,
    schedule: RwLock<Option<Arc<dyn Schedule>>>,
    executor: RwLock<Option<Arc<dyn ScheduledExecutor>>>,
    clock: RwLock<Option<Arc<dyn Clock>>>,
    time_zone: RwLock<FixedOffset>,
    limits: RwLock<Option<Interval>>,
    limits_target: RwLock<Option<Weak<dyn LimitsTarget>>>,
    timing: Mutex<Timing>,
    begun: Mutex<Arc<Latch>>,
    executing: ReentrantMutex<()>,
    stop_timeout: RwLock<Duration>,
}

/// Runs one child job according to a schedule.
pub struct ScheduleDriver<P: SchedulePolicy> {
    inner: Arc<Inner<P>>,
}

impl<P: SchedulePolicy> ScheduleDriver<P> {
    pub fn new(name: impl Into<String>, policy: P) -> Self {
        let name = name.into();
        let handler = Arc::new(StateHandler::new(name.clone()));
        let children = ChildHelper::new(name.clone());
        let aggregator = StateAggregator::new(name.clone());
        aggregator.attach(&children);
        // A child that never ran leaves an exhausted schedule complete.
        let reflector = ChildStateReflector::new(handler.clone()).with_mapping(|state| match state {
            ParentState::Ready => ParentState::Complete,
            other => other,
        });
        let begun = Latch::new();
        begun.release();
        Self {
            inner: Arc::new(Inner {
                name,
                policy,
                handler,
                children,
                aggregator,
                reflector,
                schedule: RwLock::new(None),
                executor: RwLock::new(None),
                clock: RwLock::new(None),
                time_zone: RwLock::new(utc_offset()),
                limits: RwLock::new(None),
                limits_target: RwLock::new(None),
                timing: Mutex::new(Timing::default()),
                begun: Mutex::new(Arc::new(begun)),
                executing: ReentrantMutex::new(()),
                stop_timeout: RwLock::new(DEFAULT_STOP_TIMEOUT),
            }),
        }
    }

    pub fn policy(&self) -> &P {
        &self.inner.policy
    }

    pub fn set_schedule(&self, schedule: Arc<dyn Schedule>) {
        *self.inner.schedule.write() = Some(schedule);
    }

    pub fn set_executor(&self, executor: Arc<dyn ScheduledExecutor>) {
        *self.inner.executor.write() = Some(executor);
    }

    pub fn set_clock(&self, clock: Arc<dyn Clock>) {
        *self.inner.clock.write() = Some(clock);
    }

    pub fn set_time_zone(&self, time_zone: FixedOffset) {
        *self.inner.time_zone.write() = time_zone;
    }

    /// Set the time zone from text such as `+01:00`.
    pub fn set_time_zone_id(&self, id: &str) -> Result<()> {
        self.set_time_zone(parse_time_zone(id)?);
        Ok(())
    }

    pub fn time_zone(&self) -> FixedOffset {
        *self.inner.time_zone.read()
    }

    /// Only schedule inside `limits`. Overrides the policy's limits;
    /// `None` falls back to them.
    pub fn set_limits(&self, limits: Option<Interval>) {
        *self.inner.limits.write() = limits;
    }

    /// The limits schedule evaluations are currently bounded by.
    pub fn limits(&self) -> Option<Interval> {
        self.inner.limits()
    }

    /// Before each run, hand `child` the interval this driver is working
    /// to as its limits. This is how a timer keeps a retry inside the
    /// current occurrence.
    pub fn pass_limits_to<Q: SchedulePolicy>(&self, child: &ScheduleDriver<Q>) {
        let target: Weak<dyn LimitsTarget> = Arc::downgrade(&child.inner) as Weak<Inner<Q>>;
        *self.inner.limits_target.write() = Some(target);
    }

    pub fn set_stop_timeout(&self, timeout: Duration) {
        *self.inner.stop_timeout.write() = timeout;
    }

    /// Set or clear the driven job. The job must be stateful.
    pub fn set_job(&self, job: Option<Arc<dyn Job>>) -> Result<()> {
        match job {
            None => {
                self.inner.children.remove_child_at(0);
            }
            Some(job) => {
                if job.as_stateful().is_none() {
                    return Err(ScheduleError::NotStateful(job.name().to_string()));
                }
                self.inner.children.remove_child_at(0);
                self.inner.children.insert_child(0, job);
            }
        }
        Ok(())
    }

    pub fn job(&self) -> Option<Arc<dyn Job>> {
        self.inner.children.child()
    }

    pub fn state(&self) -> ParentState {
        self.inner.handler.state()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock()
    }

    /// When the child is next due. `None` when nothing is scheduled.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.inner.timing.lock().next_due
    }

    /// When the child was last run for.
    pub fn last_due(&self) -> Option<DateTime<Utc>> {
        self.inner.timing.lock().last_due
    }

    /// The schedule result currently being worked to.
    pub fn current(&self) -> Option<ScheduleResult> {
        self.inner.timing.lock().current
    }

    /// How many times the child has been run since the last reset.
    pub fn executions(&self) -> u64 {
        self.inner.timing.lock().executions
    }

    /// Cancel what is pending, stop the child and evaluate the schedule
    /// again from `date`. Only allowed once started; otherwise the request
    /// is logged and `Ok(false)` returned.
    pub fn set_reschedule(&self, date: DateTime<Utc>) -> Result<bool> {
        self.inner.override_schedule("reschedule", |inner| {
            info!(timer = %inner.name, "Rescheduling with {}", date);
            inner.schedule_from(Some(date))
        })
    }

    /// Cancel what is pending, stop the child and make it due at `date`
    /// without consulting the schedule. `None` ends the schedule.
    pub fn set_next_due(&self, date: Option<DateTime<Utc>>) -> Result<bool> {
        self.inner.override_schedule("set next due", |inner| {
            match date {
                Some(date) => info!(timer = %inner.name, "Manually setting next due to {}", date),
                None => info!(timer = %inner.name, "Manually clearing next due"),
            }
            inner.apply_next_due(date)
        })
    }
}

impl<P: SchedulePolicy> LimitsTarget for Inner<P> {
    fn set_limits(&self, limits: Option<Interval>) {
        debug!(timer = %self.name, "Limits now {:?}", limits);
        *self.limits.write() = limits;
    }
}

impl<P: SchedulePolicy> Inner<P> {
    fn limits(&self) -> Option<Interval> {
        (*self.limits.read()).or_else(|| self.policy.limits())
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.clock
            .read()
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultClock))
    }

    fn begin(self: &Arc<Self>) -> Result<()> {
        if self.schedule.read().is_none() {
            return Err(ScheduleError::NoSchedule);
        }
        if self.executor.read().is_none() {
            return Err(ScheduleError::NoExecutor);
        }
        {
            let mut clock = self.clock.write();
            if clock.is_none() {
                *clock = Some(Arc::new(DefaultClock));
            }
        }
        let now = self.clock().now();
        self.schedule_from(Some(now))
    }

    /// Evaluate the schedule from `from` and arm the next execution.
    fn schedule_from(self: &Arc<Self>, from: Option<DateTime<Utc>>) -> Result<()> {
        debug!(timer = %self.name, "Scheduling from {:?}", from);
        self.arm_with(|timing| {
            let Some(date) = from else {
                return Ok(None);
            };
            let schedule = self.schedule.read().clone().ok_or(ScheduleError::NoSchedule)?;
            let mut context = ScheduleContext::new(date, &mut timing.context)
                .with_time_zone(*self.time_zone.read())
                .with_parent_interval(self.limits());
            timing.current = schedule.next_due(&mut context)?;
            Ok(timing.current.map(|c| c.from_date()))
        })
    }

    fn apply_next_due(self: &Arc<Self>, next: Option<DateTime<Utc>>) -> Result<()> {
        self.arm_with(|_| Ok(next))
    }

    /// Work out the next due date, arm it and publish that the driver is
    /// waiting, all under the transition guard so the execution can not
    /// be activated first. Reflects the child once nothing is due.
    fn arm_with<F>(self: &Arc<Self>, next_of: F) -> Result<()>
    where
        F: FnOnce(&mut Timing) -> Result<Option<DateTime<Utc>>>,
    {
        let exhausted = self.handler.call_locked(|| -> Result<bool> {
            let mut timing = self.timing.lock();
            if timing.stop {
                debug!(timer = %self.name, "Stopped, not scheduling");
                return Ok(false);
            }
            let next = next_of(&mut *timing)?;
            let exhausted = self.arm(&mut timing, next)?;
            drop(timing);
            if !exhausted
                && matches!(self.handler.state(), ParentState::Executing | ParentState::Active)
            {
                self.handler.set_state(ParentState::Started);
                self.handler.fire_event();
            }
            Ok(exhausted)
        })??;
        if exhausted {
            self.finish();
        }
        Ok(())
    }

    /// Record `next` and arm an execution for it. Returns true when there
    /// is nothing further to run.
    fn arm(self: &Arc<Self>, timing: &mut Timing, next: Option<DateTime<Utc>>) -> Result<bool> {
        timing.next_due = next;
        let Some(due) = next else {
            return Ok(true);
        };
        let executor = self.executor.read().clone().ok_or(ScheduleError::NoExecutor)?;
        let delay = (due - self.clock().now()).to_std().unwrap_or(Duration::ZERO);
        let weak = Arc::downgrade(self);
        let handle = executor.schedule(
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.execute();
                }
            }),
            delay,
        );
        if let Some(previous) = timing.pending.replace(handle) {
            previous.cancel();
        }
        info!(timer = %self.name, "Next due at {} in {:?}", due.to_rfc3339(), delay);
        Ok(false)
    }

    fn finish(&self) {
        info!(timer = %self.name, "There is no next due, schedule finished");
        self.reflector.start(&self.aggregator);
    }

    /// The deferred execution. Runs on the executor's thread.
    fn execute(self: &Arc<Self>) {
        // Wait until the driver has published that it started.
        let begun = self.begun.lock().clone();
        begun.wait();

        let Some(child) = self.children.child() else {
            warn!(timer = %self.name, "Nothing to run, job is missing");
            return;
        };
        // Only a driver waiting for its next due runs the child. A failed,
        // stopped or finished driver declines.
        let activated = self.handler.wait_to_when(StateCondition::Started, || {
            if self.handler.state() != ParentState::Active {
                self.handler.set_state(ParentState::Active);
                self.handler.fire_event();
            }
        });
        match activated {
            Ok(true) => {}
            Ok(false) => {
                info!(timer = %self.name, state = %self.handler.state(), "Not executing [{}]", child.name());
                return;
            }
            Err(e) => {
                warn!(timer = %self.name, "Not executing [{}]: {}", child.name(), e);
                return;
            }
        }

        let _executing = self.executing.lock();
        let (due, current) = {
            let mut timing = self.timing.lock();
            if timing.stop {
                info!(timer = %self.name, "Not executing [{}] as we have now stopped", child.name());
                return;
            }
            timing.pending = None;
            timing.last_due = timing.next_due;
            timing.executions += 1;
            (timing.next_due, timing.current)
        };
        info!(timer = %self.name, "Executing [{}] due at {:?}", child.name(), due);

        if let Some(resettable) = child.as_resettable() {
            self.policy.reset_child(resettable);
        }
        let target = self.limits_target.read().as_ref().and_then(Weak::upgrade);
        if let Some(target) = target {
            target.set_limits(current.map(|c| c.interval));
        }
        let Some(stateful) = child.as_stateful() else {
            return;
        };
        if !self.subscribe(stateful) {
            return;
        }

        match child.run() {
            Ok(()) => info!(timer = %self.name, "Finished executing [{}]", child.name()),
            Err(e) => {
                error!(timer = %self.name, "Failed running scheduled job: {}", e);
                self.fail(ScheduleError::Job(e));
            }
        }
    }

    /// Listen for the child's next terminal state, exactly once. Returns
    /// false if the driver stopped meanwhile.
    fn subscribe(self: &Arc<Self>, stateful: &dyn Stateful) -> bool {
        let weak = Arc::downgrade(self);
        let once = OneShot::new(move |state: &State| {
            if let Some(inner) = weak.upgrade() {
                inner.child_finished(*state);
            }
        });
        // The current state is delivered on registration and ignored.
        let armed = Arc::new(AtomicBool::new(false));
        let listener = {
            let once = once.clone();
            let armed = armed.clone();
            Arc::new(move |event: &StateEvent| {
                let state = event.state;
                if !armed.load(Ordering::SeqCst) || state.is_ready() || state.is_stoppable() {
                    return;
                }
                once.fire(&state);
            })
        };
        let id = stateful.add_state_listener(listener);
        armed.store(true, Ordering::SeqCst);

        let mut timing = self.timing.lock();
        if timing.stop {
            drop(timing);
            once.cancel();
            stateful.remove_state_listener(id);
            return false;
        }
        timing.subscription = Some((id, once));
        true
    }

    fn unsubscribe(&self, subscription: Option<(ListenerId, Arc<OneShot<State>>)>) {
        let Some((id, once)) = subscription else {
            return;
        };
        once.cancel();
        if let Some(stateful) = self.children.child().as_deref().and_then(|c| c.as_stateful()) {
            stateful.remove_state_listener(id);
        }
    }

    /// The child reached a terminal state.
    fn child_finished(self: &Arc<Self>, state: State) {
        let (subscription, current, stopped) = {
            let mut timing = self.timing.lock();
            (timing.subscription.take(), timing.current, timing.stop)
        };
        // Detach before scheduling again.
        self.unsubscribe(subscription);
        if stopped {
            return;
        }
        debug!(timer = %self.name, "Rescheduling based on state {}", state);
        let from = self
            .policy
            .reschedule_on(state, current.as_ref(), self.clock().now());
        if let Err(e) = self.schedule_from(from) {
            self.fail(e);
        }
    }

    /// Disarm and move to the exception state. Nothing runs again until
    /// the driver is reset.
    fn fail(&self, error: ScheduleError) {
        error!(timer = %self.name, "{} failed: {}", self.policy.kind(), error);
        let (pending, subscription) = {
            let mut timing = self.timing.lock();
            timing.stop = true;
            timing.next_due = None;
            (timing.pending.take(), timing.subscription.take())
        };
        if let Some(pending) = pending {
            pending.cancel();
        }
        self.unsubscribe(subscription);
        let result = self.handler.wait_to_when(StateCondition::Any, || {
            self.handler.set_state_exception(error.into());
            self.handler.fire_event();
        });
        if let Err(e) = result {
            error!(timer = %self.name, "Could not record failure: {}", e);
        }
    }

    /// Cancel the pending execution and stop the child, leaving the stop
    /// flag raised. Returns once any in-flight execution has finished.
    fn cancel_and_stop_child(&self) -> std::result::Result<(), JobError> {
        let (pending, subscription) = {
            let mut timing = self.timing.lock();
            timing.stop = true;
            (timing.pending.take(), timing.subscription.take())
        };
        if let Some(pending) = pending {
            pending.cancel();
        }
        self.unsubscribe(subscription);

        let timeout = *self.stop_timeout.read();
        let deadline = Instant::now() + timeout;
        loop {
            self.children.stop_children()?;
            if let Some(_idle) = self.executing.try_lock_for(STOP_POLL) {
                break;
            }
            if Instant::now() >= deadline {
                return Err(JobError::FailedToStop {
                    name: self.name.clone(),
                    reason: "scheduled execution still running".to_string(),
                });
            }
        }
        if let Some(child) = self.children.child() {
            if let Some(stateful) = child.as_stateful() {
                wait_for_stop(child.name(), stateful, timeout)?;
            }
        }
        Ok(())
    }

    fn override_schedule<F>(self: &Arc<Self>, operation: &str, apply: F) -> Result<bool>
    where
        F: FnOnce(&Arc<Self>) -> Result<()>,
    {
        let mut outcome = Ok(());
        let done = self.handler.try_to_when(StateCondition::Started, || {
            outcome = self
                .cancel_and_stop_child()
                .map_err(ScheduleError::from)
                .and_then(|_| {
                    self.timing.lock().stop = false;
                    apply(self)
                });
        });
        match done {
            Ok(true) => outcome.map(|_| true),
            Ok(false) => {
                info!(timer = %self.name, "Can only {} once the {} has started", operation, self.policy.kind());
                Ok(false)
            }
            Err(StateLockError::Locked) => {
                warn!(timer = %self.name, "Can not {} while the {} is changing state", operation, self.policy.kind());
                Err(ScheduleError::Lock(StateLockError::Locked))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn reset(&self, condition: StateCondition, hard: bool) -> bool {
        let allowed = self.handler.wait_to_when(condition, || {
            self.reflector.stop(&self.aggregator);
        });
        match allowed {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!(timer = %self.name, "Reset failed: {}", e);
                return false;
            }
        }
        if hard {
            self.children.hard_reset_children();
        } else {
            self.children.soft_reset_children();
        }
        {
            let mut timing = self.timing.lock();
            if let Some(pending) = timing.pending.take() {
                pending.cancel();
            }
            let subscription = timing.subscription.take();
            *timing = Timing::default();
            drop(timing);
            self.unsubscribe(subscription);
        }
        if let Err(e) = self.handler.change_state(ParentState::Ready) {
            warn!(timer = %self.name, "Reset failed: {}", e);
            return false;
        }
        debug!(timer = %self.name, hard, "Reset");
        true
    }
}

impl<P: SchedulePolicy> Job for ScheduleDriver<P> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn run(&self) -> std::result::Result<(), JobError> {
        let inner = &self.inner;
        let begun = Arc::new(Latch::new());
        let started = inner.handler.wait_to_when(StateCondition::Executable, || {
            *inner.begun.lock() = begun.clone();
            inner.timing.lock().stop = false;
            inner.handler.set_state(ParentState::Executing);
            inner.handler.fire_event();
        })?;
        if !started {
            warn!(timer = %inner.name, state = %inner.handler.state(), "Not ready to run");
            return Ok(());
        }
        let _release = ReleaseOnDrop(&begun);
        info!(timer = %inner.name, "Starting {}", inner.policy.kind());

        if let Err(e) = inner.begin() {
            inner.fail(e);
        }
        Ok(())
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        Some(self.inner.handler.as_ref())
    }

    fn as_structural(&self) -> Option<&dyn Structural> {
        Some(&self.inner.children)
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }

    fn as_describable(&self) -> Option<&dyn Describable> {
        Some(self)
    }

    fn as_log_enabled(&self) -> Option<&dyn LogEnabled> {
        Some(self)
    }
}

impl<P: SchedulePolicy> Describable for ScheduleDriver<P> {
    fn describe(&self) -> BTreeMap<String, String> {
        let (current, next_due, last_due, executions) = {
            let timing = self.inner.timing.lock();
            (timing.current, timing.next_due, timing.last_due, timing.executions)
        };
        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), self.inner.name.clone());
        properties.insert("kind".to_string(), self.inner.policy.kind().to_string());
        properties.insert("state".to_string(), self.state().to_string());
        properties.insert("executions".to_string(), executions.to_string());
        properties.insert("timeZone".to_string(), self.time_zone().to_string());
        if let Some(current) = current {
            properties.insert("current".to_string(), current.to_string());
        }
        if let Some(next_due) = next_due {
            properties.insert("nextDue".to_string(), next_due.to_rfc3339());
        }
        if let Some(last_due) = last_due {
            properties.insert("lastDue".to_string(), last_due.to_rfc3339());
        }
        if let Some(limits) = self.limits() {
            properties.insert("limits".to_string(), limits.to_string());
        }
        properties
    }
}

impl<P: SchedulePolicy> LogEnabled for ScheduleDriver<P> {
    /// Driver output is logged under this module with the driver's name in
    /// the `timer` field.
    fn logger_name(&self) -> String {
        module_path!().to_string()
    }
}

impl<P: SchedulePolicy> Stoppable for ScheduleDriver<P> {
    fn stop(&self) -> std::result::Result<(), JobError> {
        let inner = &self.inner;
        if !StateCondition::Stoppable.test(inner.handler.state().into()) {
            return Ok(());
        }
        info!(timer = %inner.name, "Stopping");
        inner.cancel_and_stop_child()?;
        inner.reflector.stop(&inner.aggregator);
        inner.handler.change_state(ParentState::Ready)?;
        Ok(())
    }
}

impl<P: SchedulePolicy> Resettable for ScheduleDriver<P> {
    fn soft_reset(&self) -> bool {
        self.inner.reset(StateCondition::SoftResetable, false)
    }

    fn hard_reset(&self) -> bool {
        self.inner.reset(StateCondition::HardResetable, true)
    }
}

impl<P: SchedulePolicy> Drop for ScheduleDriver<P> {
    fn drop(&mut self) {
        if let Some(pending) = self.inner.timing.lock().pending.take() {
            pending.cancel();
        }
    }
}

impl<P: SchedulePolicy> fmt::Debug for ScheduleDriver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleDriver")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.policy.kind())
            .field("state", &self.state())
            .field("next_due", &self.next_due())
            .field("limits", &self.limits())
            .finish()
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
