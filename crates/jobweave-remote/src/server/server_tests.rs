use super::*;
use parking_lot::Mutex;

use jobweave_core::{FnJob, SequentialJob};
use jobweave_protocols::JobState;

use crate::notification::{ChildData, Notification, StateData, STATE_TYPE, STRUCTURAL_TYPE};

fn leaf(name: &str) -> Arc<dyn Job> {
    Arc::new(FnJob::completing(name))
}

fn structural_log(session: &ServerSession, id: RemoteId) -> Arc<Mutex<Vec<(u64, Vec<u64>)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    session
        .add_notification_listener(
            id,
            STRUCTURAL_TYPE,
            Arc::new(move |n: &Notification| {
                let data: ChildData = n.payload().unwrap();
                sink.lock()
                    .push((n.sequence, data.children.iter().map(|c| c.0).collect()));
            }),
        )
        .unwrap();
    log
}

fn snapshot(session: &ServerSession, id: RemoteId) -> (u64, Vec<u64>) {
    let value = session
        .invoke(id, operations::STRUCTURAL_SYNCHRONIZE, Value::Null)
        .unwrap();
    let last: Vec<Notification> = serde_json::from_value(value).unwrap();
    assert_eq!(last.len(), 1);
    let data: ChildData = last[0].payload().unwrap();
    (last[0].sequence, data.children.iter().map(|c| c.0).collect())
}

#[test]
fn test_export_assigns_ids() {
    let session = ServerSession::new();
    let root = Arc::new(SequentialJob::with_children("root", vec![leaf("a"), leaf("b")]));

    assert_eq!(session.export_root(root.clone()).unwrap(), RemoteId::ROOT);

    assert_eq!(session.len(), 3);
    assert_eq!(snapshot(&session, RemoteId::ROOT), (2, vec![1, 2]));
    let a = root.children()[0].clone();
    assert_eq!(session.id_of(&a), Some(RemoteId(1)));
}

#[test]
fn test_changes_send_full_snapshots() {
    let session = ServerSession::new();
    let root = Arc::new(SequentialJob::new("root"));
    session.export_root(root.clone()).unwrap();
    let log = structural_log(&session, RemoteId::ROOT);

    root.add_child(leaf("a"));
    root.add_child(leaf("b"));
    root.insert_child(1, leaf("c"));
    root.remove_child_at(0);

    assert_eq!(
        *log.lock(),
        vec![
            (1, vec![1]),
            (2, vec![1, 2]),
            (3, vec![1, 3, 2]),
            (4, vec![3, 2]),
        ]
    );
    // The removed child was destroyed with its removal.
    assert!(matches!(
        session.invoke(RemoteId(1), operations::DESCRIBE, Value::Null),
        Err(RemoteError::NoSuchObject(RemoteId(1)))
    ));
    assert_eq!(snapshot(&session, RemoteId::ROOT), (4, vec![3, 2]));
}

#[test]
fn test_loopback_child_is_skipped() {
    let session = ServerSession::new();
    let root = Arc::new(SequentialJob::new("root"));
    session.export_root(root.clone()).unwrap();
    let log = structural_log(&session, RemoteId::ROOT);

    root.add_child(leaf("a"));
    root.add_child(root.clone());
    root.add_child(leaf("b"));
    assert_eq!(*log.lock(), vec![(1, vec![1]), (2, vec![1, 2])]);

    // Removing the loopback changes nothing remotely.
    root.remove_child_at(1);
    assert_eq!(log.lock().len(), 2);
    assert_eq!(session.len(), 3);

    root.remove_child_at(1);
    assert_eq!(log.lock().last(), Some(&(3, vec![1])));
}

#[test]
fn test_nested_loopback_is_skipped() {
    let session = ServerSession::new();
    let inner = Arc::new(SequentialJob::new("inner"));
    let root = Arc::new(SequentialJob::with_children("root", vec![inner.clone() as Arc<dyn Job>]));
    session.export_root(root.clone()).unwrap();

    inner.add_child(root.clone());
    inner.add_child(leaf("x"));

    assert_eq!(session.len(), 3);
    assert_eq!(snapshot(&session, RemoteId(1)), (1, vec![2]));
}

#[test]
fn test_repeated_sibling_is_exported_each_time() {
    let session = ServerSession::new();
    let root = Arc::new(SequentialJob::new("root"));
    session.export_root(root.clone()).unwrap();
    let log = structural_log(&session, RemoteId::ROOT);

    let shared = leaf("shared");
    root.add_child(shared.clone());
    root.add_child(shared.clone());
    assert_eq!(*log.lock(), vec![(1, vec![1]), (2, vec![1, 2])]);
    assert_eq!(session.len(), 3);

    root.remove_child_at(0);
    assert_eq!(log.lock().last(), Some(&(3, vec![2])));
    assert!(session.invoke(RemoteId(2), operations::DESCRIBE, Value::Null).is_ok());
}

#[test]
fn test_shared_job_under_two_parents() {
    let session = ServerSession::new();
    let shared = leaf("shared");
    let left = Arc::new(SequentialJob::with_children("left", vec![shared.clone()]));
    let root = Arc::new(SequentialJob::with_children(
        "root",
        vec![left as Arc<dyn Job>, shared.clone()],
    ));
    session.export_root(root).unwrap();

    assert_eq!(session.len(), 4);
    assert_eq!(snapshot(&session, RemoteId(1)), (1, vec![2]));
    assert_eq!(snapshot(&session, RemoteId::ROOT), (2, vec![1, 3]));
}

#[test]
fn test_properties_fall_back_to_name_and_state() {
    let session = ServerSession::new();
    let job = Arc::new(FnJob::completing("job"));
    let id = session.export(job.clone()).unwrap();
    job.run().unwrap();

    let value = session.invoke(id, operations::PROPERTIES, Value::Null).unwrap();
    let properties: BTreeMap<String, String> = serde_json::from_value(value).unwrap();
    assert_eq!(properties.get("name").map(String::as_str), Some("job"));
    assert_eq!(properties.get("state").map(String::as_str), Some("COMPLETE"));

    // Plain jobs do not name a logger.
    assert!(matches!(
        session.invoke(id, operations::LOGGER_NAME, Value::Null),
        Err(RemoteError::UnknownOperation { .. })
    ));
    let description: Description =
        serde_json::from_value(session.invoke(id, operations::DESCRIBE, Value::Null).unwrap()).unwrap();
    assert!(!description.log_enabled);
}

#[test]
fn test_teardown_removes_in_reverse() {
    let session = ServerSession::new();
    let inner = Arc::new(SequentialJob::with_children("inner", vec![leaf("x")]));
    let root = Arc::new(SequentialJob::with_children(
        "root",
        vec![leaf("a"), inner.clone(), leaf("b")],
    ));
    session.export_root(root).unwrap();
    assert_eq!(session.len(), 5);
    let log = structural_log(&session, RemoteId::ROOT);

    assert!(session.destroy(RemoteId::ROOT));

    let lists: Vec<Vec<u64>> = log.lock().iter().map(|(_, l)| l.clone()).collect();
    assert_eq!(lists, vec![vec![1, 2], vec![1], vec![]]);
    assert!(session.is_empty());
    // The nested job is no longer followed.
    inner.add_child(leaf("y"));
    assert!(session.is_empty());
}

#[test]
fn test_state_is_published() {
    let session = ServerSession::new();
    let job = Arc::new(FnJob::completing("job"));
    let id = session.export(job.clone()).unwrap();
    assert_eq!(id, RemoteId(1));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    session
        .add_notification_listener(
            id,
            STATE_TYPE,
            Arc::new(move |n: &Notification| {
                sink.lock().push(n.payload::<StateData>().unwrap().state);
            }),
        )
        .unwrap();

    job.run().unwrap();
    assert_eq!(
        *seen.lock(),
        vec![JobState::Executing.into(), JobState::Complete.into()]
    );

    let value = session
        .invoke(id, operations::STATE_SYNCHRONIZE, Value::Null)
        .unwrap();
    let last: Vec<Notification> = serde_json::from_value(value).unwrap();
    assert_eq!(last[0].payload::<StateData>().unwrap().state, JobState::Complete.into());
}

#[test]
fn test_invoke_errors() {
    let session = ServerSession::new();
    let id = session.export(leaf("a")).unwrap();

    assert!(matches!(
        session.invoke(id, "explode", Value::Null),
        Err(RemoteError::UnknownOperation { .. })
    ));
    assert!(matches!(
        session.invoke(id, operations::STRUCTURAL_SYNCHRONIZE, Value::Null),
        Err(RemoteError::UnknownOperation { .. })
    ));
    assert!(matches!(
        session.invoke(RemoteId(99), operations::DESCRIBE, Value::Null),
        Err(RemoteError::NoSuchObject(RemoteId(99)))
    ));
    assert!(matches!(
        session.add_notification_listener(RemoteId(99), STATE_TYPE, Arc::new(|_: &Notification| {})),
        Err(RemoteError::NoSuchObject(_))
    ));
}
