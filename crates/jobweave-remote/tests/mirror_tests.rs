use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use jobweave_core::{FnJob, SequentialJob, StateAggregator};
use jobweave_protocols::{
    Describable, Job, JobError, JobState, ListenerId, LogEnabled, ParentState, State, StateEvent,
    StructuralEvent, StructuralListener,
};
use jobweave_remote::{
    operations, ClientProxy, Connection, LocalClientSession, Notification, NotificationListener,
    RemoteError, RemoteId, ServerSession, STRUCTURAL_TYPE,
};

/// A connection that can lose notifications and fail operations.
struct Unreliable {
    server: Arc<ServerSession>,
    undescribable: Mutex<HashSet<RemoteId>>,
    offline: AtomicBool,
    drop_structural: Arc<AtomicUsize>,
}

impl Unreliable {
    fn new(server: Arc<ServerSession>) -> Arc<Self> {
        Arc::new(Self {
            server,
            undescribable: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
            drop_structural: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn lose_next(&self, count: usize) {
        self.drop_structural.store(count, Ordering::SeqCst);
    }
}

impl Connection for Unreliable {
    fn invoke(&self, id: RemoteId, operation: &str, args: Value) -> jobweave_remote::Result<Value> {
        if operation == operations::DESCRIBE && self.undescribable.lock().contains(&id) {
            return Err(RemoteError::NoSuchObject(id));
        }
        if operation == operations::STRUCTURAL_SYNCHRONIZE && self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Fault("offline".into()));
        }
        self.server.invoke(id, operation, args)
    }

    fn add_notification_listener(
        &self,
        id: RemoteId,
        kind: &str,
        listener: NotificationListener,
    ) -> jobweave_remote::Result<ListenerId> {
        let losses = self.drop_structural.clone();
        let structural = kind == STRUCTURAL_TYPE;
        self.server.add_notification_listener(
            id,
            kind,
            Arc::new(move |n: &Notification| {
                let lost = structural
                    && losses
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
                        .is_ok();
                if !lost {
                    listener(n);
                }
            }),
        )
    }

    fn remove_notification_listener(&self, id: RemoteId, kind: &str, listener: ListenerId) {
        self.server.remove_notification_listener(id, kind, listener);
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl StructuralListener for Recorder {
    fn child_added(&self, event: &StructuralEvent) {
        self.events
            .lock()
            .push(format!("+{}@{}", event.child.name(), event.index));
    }

    fn child_removed(&self, event: &StructuralEvent) {
        self.events
            .lock()
            .push(format!("-{}@{}", event.child.name(), event.index));
    }
}

/// Describes how often it ran and names its own logger.
#[derive(Default)]
struct Counted {
    runs: AtomicUsize,
}

impl Job for Counted {
    fn name(&self) -> &str {
        "counted"
    }

    fn run(&self) -> Result<(), JobError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_describable(&self) -> Option<&dyn Describable> {
        Some(self)
    }

    fn as_log_enabled(&self) -> Option<&dyn LogEnabled> {
        Some(self)
    }
}

impl Describable for Counted {
    fn describe(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("runs".to_string(), self.runs.load(Ordering::SeqCst).to_string())])
    }
}

impl LogEnabled for Counted {
    fn logger_name(&self) -> String {
        "jobs::counted".to_string()
    }
}

fn leaf(name: &str) -> Arc<dyn Job> {
    Arc::new(FnJob::completing(name))
}

fn names(proxy: &ClientProxy) -> Vec<String> {
    proxy
        .structural_handler()
        .unwrap()
        .children()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

fn setup(root: Arc<SequentialJob>) -> (Arc<ServerSession>, Arc<Unreliable>, Arc<LocalClientSession>) {
    let server = Arc::new(ServerSession::new());
    server.export_root(root).unwrap();
    let connection = Unreliable::new(server.clone());
    let client = LocalClientSession::new(connection.clone());
    (server, connection, client)
}

#[test]
fn test_removal_destroys_only_that_proxy() {
    let root = Arc::new(SequentialJob::with_children("root", vec![leaf("a"), leaf("b"), leaf("c")]));
    let (_server, _connection, client) = setup(root.clone());
    let proxy = client.root().unwrap();
    let recorder = Arc::new(Recorder::default());
    proxy.as_structural().unwrap().add_structural_listener(recorder.clone());
    assert_eq!(names(&proxy), vec!["a", "b", "c"]);
    let b = proxy.structural_handler().unwrap().children()[1].clone();

    root.remove_child_at(1);

    assert_eq!(names(&proxy), vec!["a", "c"]);
    assert!(b.is_destroyed());
    assert_eq!(
        *recorder.events.lock(),
        vec!["+a@0", "+b@1", "+c@2", "-b@1"]
    );
}

#[test]
fn test_missed_snapshot_resyncs() {
    let root = Arc::new(SequentialJob::new("root"));
    let (_server, connection, client) = setup(root.clone());
    let proxy = client.root().unwrap();
    let recorder = Arc::new(Recorder::default());
    proxy.as_structural().unwrap().add_structural_listener(recorder.clone());

    connection.lose_next(1);
    root.add_child(leaf("a"));
    root.add_child(leaf("b"));
    assert_eq!(names(&proxy), vec!["a", "b"]);

    connection.lose_next(1);
    root.remove_child_at(0);
    root.add_child(leaf("c"));
    assert_eq!(names(&proxy), vec!["b", "c"]);
    assert_eq!(
        *recorder.events.lock(),
        vec!["+a@0", "+b@1", "-a@0", "+c@1"]
    );
}

#[test]
fn test_uncreatable_proxy_is_omitted() {
    let root = Arc::new(SequentialJob::with_children("root", vec![leaf("a"), leaf("b"), leaf("c")]));
    let (_server, connection, client) = setup(root.clone());
    connection.undescribable.lock().insert(RemoteId(2));
    let proxy = client.root().unwrap();
    let recorder = Arc::new(Recorder::default());
    proxy.as_structural().unwrap().add_structural_listener(recorder.clone());
    assert_eq!(names(&proxy), vec!["a", "c"]);

    root.remove_child_at(2);
    root.remove_child_at(1);

    assert_eq!(names(&proxy), vec!["a"]);
    assert_eq!(*recorder.events.lock(), vec!["+a@0", "+c@1", "-c@1"]);
}

#[test]
fn test_snapshot_failure_fails_attach() {
    let root = Arc::new(SequentialJob::with_children("root", vec![leaf("a")]));
    let (server, connection, client) = setup(root);
    let proxy = client.root().unwrap();
    let handler = proxy.structural_handler().unwrap();

    connection.offline.store(true, Ordering::SeqCst);
    let result = handler.try_add_structural_listener(Arc::new(Recorder::default()));
    assert!(matches!(result, Err(RemoteError::Fault(_))));
    assert!(!handler.is_connected());
    assert_eq!(server.bus().listener_count(RemoteId::ROOT, STRUCTURAL_TYPE), 0);

    connection.offline.store(false, Ordering::SeqCst);
    handler
        .try_add_structural_listener(Arc::new(Recorder::default()))
        .unwrap();
    assert_eq!(names(&proxy), vec!["a"]);
}

#[test]
fn test_last_listener_releases_children() {
    let root = Arc::new(SequentialJob::with_children("root", vec![leaf("a"), leaf("b")]));
    let (server, _connection, client) = setup(root.clone());
    let proxy = client.root().unwrap();
    let recorder = Arc::new(Recorder::default());
    let id = proxy.as_structural().unwrap().add_structural_listener(recorder.clone());
    let children = proxy.structural_handler().unwrap().children();
    assert_eq!(client.len(), 3);

    proxy.as_structural().unwrap().remove_structural_listener(id);

    assert!(children.iter().all(|c| c.is_destroyed()));
    assert_eq!(client.len(), 1);
    assert_eq!(server.bus().listener_count(RemoteId::ROOT, STRUCTURAL_TYPE), 0);
    // Later changes are not followed.
    root.add_child(leaf("c"));
    assert!(proxy.structural_handler().unwrap().children().is_empty());
}

#[test]
fn test_state_is_mirrored() {
    let job: Arc<dyn Job> = Arc::new(FnJob::new("worker", |_| Err(JobError::failed("disk full"))));
    let server = Arc::new(ServerSession::new());
    server.export_root(job).unwrap();
    let client = LocalClientSession::new(server.clone());
    let proxy = client.root().unwrap();
    assert!(proxy.as_structural().is_none());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    proxy
        .as_stateful()
        .unwrap()
        .add_state_listener(Arc::new(move |e: &StateEvent| sink.lock().push(e.state)));

    proxy.run().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            State::from(JobState::Ready),
            JobState::Executing.into(),
            JobState::Exception.into()
        ]
    );
    let last = proxy.as_stateful().unwrap().last_state_event();
    assert!(last.exception.unwrap().to_string().contains("disk full"));

    // Reset goes through to the real job.
    assert!(proxy.as_resettable().unwrap().hard_reset());
    assert_eq!(seen.lock().last(), Some(&State::from(JobState::Ready)));
}

#[test]
fn test_aggregate_over_mirrored_children() {
    let root = Arc::new(SequentialJob::with_children("root", vec![leaf("a"), leaf("b")]));
    let (_server, _connection, client) = setup(root.clone());
    let proxy = client.root().unwrap();

    let aggregator = StateAggregator::new("mirror");
    aggregator.attach(proxy.as_structural().unwrap());
    assert_eq!(aggregator.len(), 2);
    assert_eq!(aggregator.state(), ParentState::Ready);

    root.run().unwrap();

    assert_eq!(aggregator.state(), ParentState::Complete);
    // Without listeners the state is fetched on demand.
    assert_eq!(
        proxy.as_stateful().unwrap().last_state_event().state,
        State::from(ParentState::Complete)
    );
}

#[test]
fn test_properties_and_logger_are_mirrored() {
    let server = Arc::new(ServerSession::new());
    server.export_root(Arc::new(Counted::default())).unwrap();
    let client = LocalClientSession::new(server.clone());
    let proxy = client.root().unwrap();

    assert_eq!(proxy.as_log_enabled().unwrap().logger_name(), "jobs::counted");
    let describable = proxy.as_describable().unwrap();
    assert_eq!(describable.describe()["runs"], "0");

    proxy.run().unwrap();
    // Properties are asked for each time.
    assert_eq!(describable.describe()["runs"], "1");
}

#[test]
fn test_plain_job_names_no_logger() {
    let server = Arc::new(ServerSession::new());
    server.export_root(leaf("a")).unwrap();
    let client = LocalClientSession::new(server.clone());
    let proxy = client.root().unwrap();

    assert!(proxy.as_log_enabled().is_none());
    let properties = proxy.properties().unwrap();
    assert_eq!(properties["name"], "a");
    assert_eq!(properties["state"], "READY");
}
