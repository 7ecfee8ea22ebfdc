//! Mutation integration tests: path writes, stale paths and `makeGlobal`.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::{json, Value};

use common::{backend_with_host, component, event_names, record_events, CountingUpdater, PublicInstance};
use treelens_core::backend::Backend;
use treelens_core::document::{Document, PathKey};
use treelens_core::events::BackendEvent;
use treelens_core::handle::{NodeId, Opaque};
use treelens_core::mutation::{Inspected, MutationOutcome, MutationTarget};
use treelens_core::protocol::InspectPath;
use treelens_core::record::{NodeRecord, UpdateCapability};

fn path(keys: &[&str]) -> Vec<PathKey> {
    keys.iter().map(|key| PathKey::from(*key)).collect()
}

fn updates(events: &Mutex<Vec<BackendEvent>>) -> Vec<Value> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            BackendEvent::Update(node) => node.state.clone(),
            _ => None,
        })
        .collect()
}

#[test]
fn nested_write_rerenders_once_and_broadcasts() {
    let (backend, _host) = backend_with_host();
    let updater = CountingUpdater::new("Form");
    let state = Document::new(json!({"a": {"b": 1}}));
    let id = backend
        .record_mount(
            &component("Form"),
            NodeRecord::composite("Form")
                .with_state(state.clone())
                .with_updater(updater.clone()),
        )
        .unwrap();
    let events = record_events(&backend);

    let outcome = backend.set_state(&id, &path(&["a", "b"]), json!(2));

    assert_eq!(outcome, MutationOutcome::Applied);
    assert_eq!(updater.count(), 1);
    assert_eq!(state.snapshot(), json!({"a": {"b": 2}}));
    assert_eq!(event_names(&events), vec!["update"]);
    assert_eq!(updates(&events), vec![json!({"a": {"b": 2}})]);
}

#[test]
fn stale_path_changes_nothing() {
    let (backend, _host) = backend_with_host();
    let updater = CountingUpdater::new("List");
    let state = Document::new(json!({"items": null}));
    let id = backend
        .record_mount(
            &component("List"),
            NodeRecord::composite("List")
                .with_state(state.clone())
                .with_updater(updater.clone()),
        )
        .unwrap();
    let events = record_events(&backend);

    let outcome = backend.set_state(
        &id,
        &[PathKey::from("items"), PathKey::from(0usize), PathKey::from("done")],
        json!(true),
    );

    assert_eq!(outcome, MutationOutcome::Unresolved);
    assert_eq!(updater.count(), 0);
    assert_eq!(state.snapshot(), json!({"items": null}));
    assert!(event_names(&events).is_empty());
}

#[test]
fn unknown_id_is_unresolved() {
    let (backend, _host) = backend_with_host();
    let events = record_events(&backend);

    let outcome = backend.set_state(&NodeId::from("missing"), &path(&["x"]), json!(1));

    assert_eq!(outcome, MutationOutcome::Unresolved);
    assert!(event_names(&events).is_empty());
}

#[test]
fn empty_path_is_a_no_op() {
    let (backend, _host) = backend_with_host();
    let updater = CountingUpdater::new("Counter");
    let state = Document::new(json!({"count": 0}));
    let id = backend
        .record_mount(
            &component("Counter"),
            NodeRecord::composite("Counter")
                .with_state(state.clone())
                .with_updater(updater.clone()),
        )
        .unwrap();

    assert_eq!(backend.set_state(&id, &[], json!(5)), MutationOutcome::Unresolved);
    assert_eq!(state.snapshot(), json!({"count": 0}));
    assert_eq!(updater.count(), 0);
}

#[test]
fn component_without_working_updater_is_untouched() {
    let (backend, _host) = backend_with_host();
    let updater = CountingUpdater::broken("Frozen");
    let state = Document::new(json!({"count": 0}));
    let id = backend
        .record_mount(
            &component("Frozen"),
            NodeRecord::composite("Frozen")
                .with_state(state.clone())
                .with_updater(updater.clone()),
        )
        .unwrap();
    let events = record_events(&backend);

    assert_eq!(
        backend.set_state(&id, &path(&["count"]), json!(9)),
        MutationOutcome::Unsupported
    );
    assert_eq!(state.snapshot(), json!({"count": 0}));
    assert_eq!(updater.count(), 0);
    assert!(event_names(&events).is_empty());
    assert!(!backend.projection(&id).unwrap().can_update);
}

#[test]
fn component_without_updater_is_unsupported() {
    let (backend, _host) = backend_with_host();
    let id = backend
        .record_mount(
            &component("Static"),
            NodeRecord::composite("Static").with_state(json!({"count": 0})),
        )
        .unwrap();

    assert_eq!(
        backend.set_state(&id, &path(&["count"]), json!(1)),
        MutationOutcome::Unsupported
    );
}

#[test]
fn stale_path_on_a_static_component_is_unresolved() {
    let (backend, _host) = backend_with_host();
    let state = Document::new(json!({"count": 0}));
    let id = backend
        .record_mount(
            &component("Static"),
            NodeRecord::composite("Static").with_state(state.clone()),
        )
        .unwrap();
    let events = record_events(&backend);

    assert_eq!(
        backend.set_state(&id, &path(&["gone", "count"]), json!(1)),
        MutationOutcome::Unresolved
    );
    assert_eq!(
        backend.set_props(&id, &path(&["count"]), json!(1)),
        MutationOutcome::Unresolved
    );
    assert_eq!(state.snapshot(), json!({"count": 0}));
    assert!(event_names(&events).is_empty());
}

#[test]
fn props_and_context_are_writable() {
    let (backend, _host) = backend_with_host();
    let updater = CountingUpdater::new("Themed");
    let props = Document::new(json!({"title": "old"}));
    let context = Document::new(json!({"theme": {"dark": false}}));
    let id = backend
        .record_mount(
            &component("Themed"),
            NodeRecord::composite("Themed")
                .with_props(props.clone())
                .with_context(context.clone())
                .with_updater(updater.clone()),
        )
        .unwrap();

    assert_eq!(
        backend.set_props(&id, &path(&["title"]), json!("new")),
        MutationOutcome::Applied
    );
    assert_eq!(
        backend.apply_mutation(&id, MutationTarget::Context, &path(&["theme", "dark"]), json!(true)),
        MutationOutcome::Applied
    );

    assert_eq!(props.snapshot(), json!({"title": "new"}));
    assert_eq!(context.snapshot(), json!({"theme": {"dark": true}}));
    assert_eq!(updater.count(), 2);

    let projection = backend.projection(&id).unwrap();
    assert_eq!(projection.props, Some(json!({"title": "new"})));
    assert_eq!(projection.context, Some(json!({"theme": {"dark": true}})));
}

#[test]
fn missing_document_is_unresolved() {
    let (backend, _host) = backend_with_host();
    let updater = CountingUpdater::new("Stateless");
    let id = backend
        .record_mount(
            &component("Stateless"),
            NodeRecord::composite("Stateless").with_updater(updater.clone()),
        )
        .unwrap();

    assert_eq!(
        backend.set_context(&id, &path(&["theme"]), json!("dark")),
        MutationOutcome::Unresolved
    );
    assert_eq!(updater.count(), 0);
}

#[test]
fn array_writes_use_indices() {
    let (backend, _host) = backend_with_host();
    let updater = CountingUpdater::new("Todos");
    let state = Document::new(json!({"todos": [{"done": false}]}));
    let id = backend
        .record_mount(
            &component("Todos"),
            NodeRecord::composite("Todos")
                .with_state(state.clone())
                .with_updater(updater),
        )
        .unwrap();

    let outcome = backend.set_state(
        &id,
        &[PathKey::from("todos"), PathKey::from(0usize), PathKey::from("done")],
        json!(true),
    );

    assert_eq!(outcome, MutationOutcome::Applied);
    assert_eq!(state.snapshot(), json!({"todos": [{"done": true}]}));
}

/// Updater that reports a re-render back into the backend from inside
/// `force_update`, the way a synchronous host would.
struct ReentrantUpdater {
    backend: Weak<Backend>,
    handle: treelens_core::handle::Handle,
    state: Document,
    renders: AtomicUsize,
    instance: Opaque,
}

impl UpdateCapability for ReentrantUpdater {
    fn set_state(&self, _patch: Value) {}

    fn force_update(&self) {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if let Some(backend) = self.backend.upgrade() {
            backend.record_update(
                &self.handle,
                NodeRecord::composite("Echo").with_state(self.state.clone()),
            );
        }
    }

    fn public_instance(&self) -> Option<Opaque> {
        Some(self.instance.clone())
    }
}

#[test]
fn force_update_may_call_back_into_the_backend() {
    let (backend, _host) = backend_with_host();
    let handle = component("Echo");
    let state = Document::new(json!({"n": 0}));
    let updater = Arc::new(ReentrantUpdater {
        backend: Arc::downgrade(&backend),
        handle: handle.clone(),
        state: state.clone(),
        renders: AtomicUsize::new(0),
        instance: Arc::new(PublicInstance { name: "Echo".into() }),
    });
    let id = backend
        .record_mount(
            &handle,
            NodeRecord::composite("Echo")
                .with_state(state.clone())
                .with_updater(updater.clone()),
        )
        .unwrap();
    let events = record_events(&backend);

    assert_eq!(backend.set_state(&id, &path(&["n"]), json!(1)), MutationOutcome::Applied);
    assert_eq!(updater.renders.load(Ordering::SeqCst), 1);
    assert_eq!(updates(&events).last(), Some(&json!({"n": 1})));
}

#[test]
fn make_global_reads_a_record_path() {
    let (backend, _host) = backend_with_host();
    let id = backend
        .record_mount(
            &component("Counter"),
            NodeRecord::composite("Counter").with_state(json!({"count": 7})),
        )
        .unwrap();

    let value = backend.make_global(&id, &InspectPath::Keys(path(&["state", "count"])));

    assert!(matches!(value, Some(Inspected::Value(ref v)) if *v == json!(7)));
    assert!(matches!(backend.inspected_value(), Some(Inspected::Value(v)) if v == json!(7)));
    // Reading never mutates.
    assert_eq!(backend.projection(&id).unwrap().state, Some(json!({"count": 7})));
}

#[test]
fn make_global_exposes_the_public_instance() {
    let (backend, _host) = backend_with_host();
    let updater = CountingUpdater::new("Widget");
    let id = backend
        .record_mount(
            &component("Widget"),
            NodeRecord::composite("Widget").with_updater(updater.clone()),
        )
        .unwrap();

    let Some(Inspected::Instance(instance)) = backend.make_global(&id, &InspectPath::Instance) else {
        panic!("expected the public instance");
    };
    let instance = instance.downcast::<PublicInstance>().unwrap();
    assert_eq!(instance.name, "Widget");
}

#[test]
fn make_global_on_missing_path_binds_nothing() {
    let (backend, _host) = backend_with_host();
    let id = backend
        .record_mount(&component("Empty"), NodeRecord::composite("Empty"))
        .unwrap();

    assert!(backend
        .make_global(&id, &InspectPath::Keys(path(&["state", "count"])))
        .is_none());
    assert!(backend.make_global(&id, &InspectPath::Instance).is_none());
    assert!(backend.inspected_value().is_none());
}
