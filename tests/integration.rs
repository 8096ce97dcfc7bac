//! Integration tests for the graph store.

use graph_store::{
    DataId, Environment, HandleFieldPayload, HandlerRegistry, InMemoryRecordSource, PublishQueue,
    ReaderNode, RecordSource, RecordSourceProxy, RecordStatus, ResponsePayload, Result,
    Selection, Selector, Store, StoreEvent, UpdateId, Variables, ROOT_ID,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn test_queue() -> PublishQueue {
    init_tracing();
    PublishQueue::new(Arc::new(Store::default()), HandlerRegistry::with_defaults())
}

fn set_name(name: &'static str) -> impl Fn(&RecordSourceProxy<'_>) -> Result<()> {
    move |store| {
        let user = match store.get("4") {
            Some(user) => user,
            None => store.create("4", "User")?,
        };
        user.set_value(json!(name), "name", None)?;
        Ok(())
    }
}

fn user_name(store: &Store) -> Option<Value> {
    store
        .source()
        .get("4")
        .and_then(|user| user.get_value("name").unwrap())
}

fn user_selector() -> Selector {
    let node = ReaderNode::new("UserQuery", vec![Selection::scalar("name")]);
    Selector::new("4", Arc::new(node), Variables::new())
}

fn user_payload(name: &str) -> ResponsePayload {
    ResponsePayload::new(
        InMemoryRecordSource::from_json(&json!({
            "4": {"__id": "4", "__typename": "User", "name": name}
        }))
        .unwrap(),
    )
}

fn drain(handle: &graph_store::SubscriptionHandle) -> Vec<Option<Value>> {
    let mut seen = Vec::new();
    while let Ok(event) = handle.try_recv() {
        if let StoreEvent::Snapshot { snapshot } = event {
            seen.push(snapshot.data);
        }
    }
    seen
}

// --- Optimistic Update Scenarios ---

#[test]
fn test_apply_then_revert_on_empty_store() {
    let mut queue = test_queue();
    let u1 = UpdateId::next();

    queue.apply_update(u1, set_name("Greg")).unwrap();
    queue.run().unwrap();
    assert_eq!(user_name(queue.store()), Some(json!("Greg")));

    queue.revert_update(u1);
    queue.run().unwrap();
    assert_eq!(user_name(queue.store()), None);
    assert_eq!(queue.store().source().status("4"), RecordStatus::Unknown);
}

#[test]
fn test_later_update_wins_and_survives_revert() {
    let mut queue = test_queue();
    let u1 = UpdateId::next();
    let u2 = UpdateId::next();

    queue.apply_update(u1, set_name("A")).unwrap();
    queue.apply_update(u2, set_name("B")).unwrap();
    queue.run().unwrap();
    assert_eq!(user_name(queue.store()), Some(json!("B")));

    queue.revert_update(u1);
    queue.run().unwrap();
    assert_eq!(user_name(queue.store()), Some(json!("B")));
    assert_eq!(queue.applied_update_count(), 1);

    queue.revert_update(u2);
    queue.run().unwrap();
    assert_eq!(user_name(queue.store()), None);
}

#[test]
fn test_server_data_lands_under_optimistic_update() {
    let mut queue = test_queue();
    let u1 = UpdateId::next();
    queue.apply_update(u1, set_name("Optimistic")).unwrap();
    queue.run().unwrap();

    queue.commit_payload(user_selector(), user_payload("Official"));
    queue.run().unwrap();
    assert_eq!(user_name(queue.store()), Some(json!("Optimistic")));

    // Reverting now exposes the server value, not the empty pre-optimistic state.
    queue.revert_update(u1);
    queue.run().unwrap();
    assert_eq!(user_name(queue.store()), Some(json!("Official")));
}

#[test]
fn test_unregistered_handle_fails_run() {
    let mut queue = test_queue();
    let payload = user_payload("Zuck").with_field_payloads(vec![HandleFieldPayload {
        data_id: DataId::from("4"),
        field_key: "friends".into(),
        handle: "unregistered".into(),
        handle_key: "__friends_unregistered".into(),
        args: Variables::new(),
    }]);

    queue.commit_payload(user_selector(), payload);
    let err = queue.run().unwrap_err();
    assert!(err.to_string().contains("unregistered"));
}

// --- Publish Ordering ---

#[test]
fn test_payloads_commit_before_updaters_run() {
    let mut queue = test_queue();
    queue
        .apply_update(UpdateId::next(), |store: &RecordSourceProxy<'_>| {
            // Sees the payload committed in the same run.
            let user = store.get("4").ok_or_else(|| {
                graph_store::StoreError::RecordNotFound(DataId::from("4"))
            })?;
            let name = user.get_value("name", None)?.unwrap_or(Value::Null);
            user.set_value(json!(format!("{}!", name.as_str().unwrap_or(""))), "name", None)?;
            Ok(())
        })
        .unwrap();
    queue.commit_payload(user_selector(), user_payload("Zuck"));
    queue.run().unwrap();

    assert_eq!(user_name(queue.store()), Some(json!("Zuck!")));
}

#[test]
fn test_payload_updater_runs_on_committed_data() {
    let mut queue = test_queue();
    let node = ReaderNode::new(
        "CreateUser",
        vec![Selection::linked("user", vec![Selection::scalar("name")])],
    );
    let selector = Selector::root(Arc::new(node));
    let source = InMemoryRecordSource::from_json(&json!({
        "client:root": {"__id": "client:root", "__typename": "__Root", "user": {"__ref": "4"}},
        "4": {"__id": "4", "__typename": "User", "name": "Zuck"}
    }))
    .unwrap();

    queue.commit_payload_with_updater(selector, ResponsePayload::new(source), |store| {
        let user = store
            .get_root_field("user")?
            .ok_or_else(|| graph_store::StoreError::UnknownRootField("user".into()))?;
        user.set_value(json!(true), "isNew", None)?;
        Ok(())
    });
    queue.run().unwrap();

    let source = queue.store().source();
    let user = source.get("4").unwrap();
    assert_eq!(user.get_value("isNew").unwrap(), Some(json!(true)));
    assert_eq!(user.get_value("name").unwrap(), Some(json!("Zuck")));
}

#[test]
fn test_rebase_after_delete_restores_record() {
    let mut queue = test_queue();
    queue.commit_payload(user_selector(), user_payload("Zuck"));
    queue.run().unwrap();

    let delete = UpdateId::next();
    queue
        .apply_update(delete, |store: &RecordSourceProxy<'_>| store.delete("4"))
        .unwrap();
    queue.run().unwrap();
    assert_eq!(queue.store().source().status("4"), RecordStatus::Nonexistent);

    queue.revert_update(delete);
    queue.run().unwrap();
    assert_eq!(user_name(queue.store()), Some(json!("Zuck")));
}

// --- Notification ---

#[test]
fn test_one_notification_per_run() {
    let mut queue = test_queue();
    queue.commit_payload(user_selector(), user_payload("Zuck"));
    queue.run().unwrap();

    let store = Arc::clone(queue.store());
    let handle = store.subscribe(store.lookup(&user_selector()).unwrap());

    let u1 = UpdateId::next();
    queue.apply_update(u1, set_name("A")).unwrap();
    queue.apply_update(UpdateId::next(), set_name("B")).unwrap();
    queue.commit_payload(user_selector(), user_payload("Official"));
    queue.run().unwrap();
    assert_eq!(drain(&handle), vec![Some(json!({"name": "B"}))]);

    // Reverting an overwritten update changes nothing visible.
    queue.revert_update(u1);
    queue.run().unwrap();
    assert!(drain(&handle).is_empty());
}

#[test]
fn test_run_with_nothing_pending_is_quiet() {
    let mut queue = test_queue();
    queue.commit_payload(user_selector(), user_payload("Zuck"));
    queue.run().unwrap();

    let store = Arc::clone(queue.store());
    let handle = store.subscribe(store.lookup(&user_selector()).unwrap());
    queue.run().unwrap();
    assert!(drain(&handle).is_empty());
}

// --- Handlers ---

#[test]
fn test_viewer_handle_through_queue() {
    let mut queue = test_queue();
    let source = InMemoryRecordSource::from_json(&json!({
        "client:root": {"__id": "client:root", "__typename": "__Root", "viewer": {"__ref": "v1"}},
        "v1": {"__id": "v1", "__typename": "Viewer", "actor": {"__ref": "4"}},
        "4": {"__id": "4", "__typename": "User", "name": "Zuck"}
    }))
    .unwrap();
    let payload = ResponsePayload::new(source).with_field_payloads(vec![HandleFieldPayload {
        data_id: DataId::from(ROOT_ID),
        field_key: "viewer".into(),
        handle: "viewer".into(),
        handle_key: "__viewer_viewer".into(),
        args: Variables::new(),
    }]);

    let node = ReaderNode::new(
        "ViewerQuery",
        vec![Selection::linked(
            "__viewer_viewer",
            vec![Selection::linked("actor", vec![Selection::scalar("name")])],
        )],
    );
    let selector = Selector::root(Arc::new(node));
    queue.commit_payload(selector.clone(), payload);
    queue.run().unwrap();

    let snapshot = queue.store().lookup(&selector).unwrap();
    assert_eq!(
        snapshot.data,
        Some(json!({"__viewer_viewer": {"actor": {"name": "Zuck"}}}))
    );
    assert!(!snapshot.is_missing_data);
}

// --- Environment ---

#[test]
fn test_environment_round_trip() {
    init_tracing();
    let mut env = Environment::with_defaults();
    env.commit_payload(user_selector(), user_payload("Zuck")).unwrap();
    let handle = env.subscribe(env.lookup(&user_selector()).unwrap());

    let id = env.apply_update(set_name("Mark")).unwrap();
    env.commit_payload(user_selector(), user_payload("Official"))
        .unwrap();
    assert_eq!(user_name(env.store()), Some(json!("Mark")));

    env.revert_update(id).unwrap();
    assert_eq!(user_name(env.store()), Some(json!("Official")));

    env.commit_update(set_name("Local")).unwrap();
    assert_eq!(
        drain(&handle),
        vec![
            Some(json!({"name": "Mark"})),
            Some(json!({"name": "Official"})),
            Some(json!({"name": "Local"})),
        ]
    );
}

#[test]
fn test_environment_stats() {
    let mut env = Environment::with_defaults();
    env.commit_payload(user_selector(), user_payload("Zuck")).unwrap();
    let _retain = env.retain(user_selector());
    let _handle = env.subscribe(env.lookup(&user_selector()).unwrap());

    let stats = env.store().stats();
    assert_eq!(stats.record_count, 1);
    assert_eq!(stats.subscription_count, 1);
    assert_eq!(stats.retained_count, 1);
}
