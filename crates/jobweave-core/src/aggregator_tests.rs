use super::*;
use crate::child_helper::ChildHelper;
use crate::operators::AnyActiveStateOp;
use jobweave_protocols::JobError;

struct Settable {
    name: String,
    handler: StateHandler<JobState>,
}

impl Settable {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            handler: StateHandler::new(name),
        })
    }

    fn set(&self, state: JobState) {
        self.handler.change_state(state).unwrap();
    }
}

impl Job for Settable {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Result<(), JobError> {
        Ok(())
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        Some(&self.handler)
    }
}

struct Plain;

impl Job for Plain {
    fn name(&self) -> &str {
        "plain"
    }

    fn run(&self) -> Result<(), JobError> {
        Ok(())
    }
}

fn record(aggregator: &StateAggregator) -> Arc<Mutex<Vec<ParentState>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    aggregator.add_state_listener(Arc::new(move |event: &StateEvent| {
        s.lock().push(event.state.as_parent());
    }));
    seen
}

#[test]
fn test_empty_is_ready() {
    let aggregator = StateAggregator::new("parent");
    let seen = record(&aggregator);

    aggregator.recompute();

    assert_eq!(aggregator.state(), ParentState::Ready);
    assert_eq!(*seen.lock(), vec![ParentState::Ready]);
}

#[test]
fn test_single_child_scenario() {
    let aggregator = StateAggregator::new("parent");
    let seen = record(&aggregator);
    let a = Settable::new("a");

    aggregator.child_added(0, a.clone());
    assert_eq!(aggregator.state(), ParentState::Ready);
    assert_eq!(seen.lock().len(), 1);

    a.set(JobState::Executing);
    assert_eq!(aggregator.state(), ParentState::Active);

    a.set(JobState::Complete);
    assert_eq!(aggregator.state(), ParentState::Complete);
    assert_eq!(
        *seen.lock(),
        vec![ParentState::Ready, ParentState::Active, ParentState::Complete]
    );
}

#[test]
fn test_all_complete_after_adds_and_removes() {
    let aggregator = StateAggregator::new("parent");
    let jobs: Vec<_> = ["a", "b", "c"].iter().map(|n| Settable::new(n)).collect();
    for (i, p) in jobs.iter().enumerate() {
        aggregator.child_added(i, p.clone());
    }
    aggregator.child_removed(1);
    let extra = Settable::new("d");
    aggregator.child_added(0, extra.clone());

    jobs[0].set(JobState::Complete);
    jobs[2].set(JobState::Complete);
    assert_eq!(aggregator.state(), ParentState::Ready);

    extra.set(JobState::Complete);
    assert_eq!(aggregator.state(), ParentState::Complete);
    assert_eq!(aggregator.len(), 3);
}

#[test]
fn test_exception_sticks_until_child_changes_or_goes() {
    let aggregator = StateAggregator::new("parent");
    let a = Settable::new("a");
    let b = Settable::new("b");
    aggregator.child_added(0, a.clone());
    aggregator.child_added(1, b.clone());

    b.set(JobState::Exception);
    assert_eq!(aggregator.state(), ParentState::Exception);

    a.set(JobState::Complete);
    assert_eq!(aggregator.state(), ParentState::Exception);

    aggregator.child_removed(1);
    assert_eq!(aggregator.state(), ParentState::Complete);
}

#[test]
fn test_recompute_is_idempotent() {
    let aggregator = StateAggregator::new("parent");
    let a = Settable::new("a");
    aggregator.child_added(0, a.clone());
    a.set(JobState::Incomplete);
    let seen = record(&aggregator);

    aggregator.recompute();
    aggregator.recompute();

    assert_eq!(*seen.lock(), vec![ParentState::Incomplete]);
}

#[test]
fn test_non_stateful_child_counts_as_complete() {
    let aggregator = StateAggregator::new("parent");
    aggregator.child_added(0, Arc::new(Plain));
    assert_eq!(aggregator.state(), ParentState::Complete);
    assert_eq!(aggregator.child_states(), vec![Some(JobState::Complete.into())]);
}

#[test]
fn test_initial_child_state_is_captured() {
    let aggregator = StateAggregator::new("parent");
    let a = Settable::new("a");
    a.set(JobState::Incomplete);

    aggregator.child_added(0, a.clone());

    assert_eq!(aggregator.state(), ParentState::Incomplete);
}

#[test]
fn test_set_operator() {
    let aggregator = StateAggregator::new("parent");
    let a = Settable::new("a");
    let b = Settable::new("b");
    aggregator.child_added(0, a.clone());
    aggregator.child_added(1, b.clone());
    a.set(JobState::Executing);
    b.set(JobState::Exception);
    let seen = record(&aggregator);

    assert!(!aggregator.set_operator(Arc::new(WorstStateOp)));
    assert!(aggregator.set_operator(Arc::new(AnyActiveStateOp)));

    assert_eq!(aggregator.operator_name(), "any-active");
    assert_eq!(*seen.lock(), vec![ParentState::Exception, ParentState::Active]);
}

#[test]
fn test_destroyed_child_keeps_previous_state() {
    let aggregator = StateAggregator::new("parent");
    let a = Settable::new("a");
    aggregator.child_added(0, a.clone());
    a.set(JobState::Complete);

    a.set(JobState::Destroyed);

    assert_eq!(aggregator.state(), ParentState::Complete);
}

#[test]
fn test_removed_child_is_unsubscribed() {
    let aggregator = StateAggregator::new("parent");
    let a = Settable::new("a");
    aggregator.child_added(0, a.clone());
    assert_eq!(a.handler.listener_count(), 1);

    aggregator.child_removed(0);

    assert_eq!(a.handler.listener_count(), 0);
    a.set(JobState::Exception);
    assert_eq!(aggregator.state(), ParentState::Ready);
}

#[test]
fn test_drop_unsubscribes() {
    let a = Settable::new("a");
    {
        let aggregator = StateAggregator::new("parent");
        aggregator.child_added(0, a.clone());
    }
    assert_eq!(a.handler.listener_count(), 0);
}

#[test]
fn test_attach_follows_structure() {
    let helper = ChildHelper::new("parent");
    let a = Settable::new("a");
    helper.add_child(a.clone());

    let aggregator = StateAggregator::new("parent");
    let id = aggregator.attach(&helper);
    assert_eq!(aggregator.len(), 1);

    let b = Settable::new("b");
    helper.add_child(b.clone());
    a.set(JobState::Complete);
    assert_eq!(aggregator.state(), ParentState::Ready);

    helper.remove_child_at(1);
    assert_eq!(aggregator.state(), ParentState::Complete);

    aggregator.detach(&helper, id);
    assert!(aggregator.is_empty());
    assert!(helper.has_no_listeners());
    assert_eq!(aggregator.state(), ParentState::Ready);
}
