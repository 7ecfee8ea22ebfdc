//! Shared test helpers for treelens-core integration tests.
//!
//! Provides a scriptable host framework, a counting update capability and
//! small helpers to collect backend events and bridge frames.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use treelens_core::backend::Backend;
use treelens_core::config::TreelensConfig;
use treelens_core::events::BackendEvent;
use treelens_core::handle::{opaque_address, Handle, Opaque};
use treelens_core::host::HostFramework;
use treelens_core::protocol::BridgeFrame;
use treelens_core::record::UpdateCapability;

// ---------------------------------------------------------------------------
// Host objects
// ---------------------------------------------------------------------------

/// A component instance owned by the mock host.
#[derive(Debug)]
pub struct TestComponent {
    pub name: String,
}

/// Framework-level tree handle owned by a component.
#[derive(Debug)]
pub struct FrameworkHandle {
    pub owner: String,
}

/// A rendered UI node.
#[derive(Debug)]
pub struct UiNode {
    pub label: String,
}

pub fn component(name: &str) -> Handle {
    Handle::instance(Arc::new(TestComponent {
        name: name.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Mock host framework
// ---------------------------------------------------------------------------

/// A host framework whose tree is built by the test.
#[derive(Default)]
pub struct MockHost {
    /// component address -> framework handle
    framework: Mutex<HashMap<usize, Handle>>,
    /// UI node address -> framework handle
    nodes: Mutex<HashMap<usize, Handle>>,
    /// component address -> UI node
    rendered: Mutex<HashMap<usize, Opaque>>,
    inspected: Mutex<Option<Opaque>>,
    detached: AtomicBool,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Gives `component` a framework handle and a UI node, returning the node.
    pub fn render(&self, component: &Handle) -> Opaque {
        let address = component_address(component);
        let owner = format!("{address:x}");
        let framework = Handle::instance(Arc::new(FrameworkHandle { owner: owner.clone() }));
        let node: Opaque = Arc::new(UiNode { label: owner });

        self.framework.lock().unwrap().insert(address, framework.clone());
        self.nodes.lock().unwrap().insert(opaque_address(&node), framework);
        self.rendered.lock().unwrap().insert(address, node.clone());
        node
    }

    /// Removes the UI node of `component` from the screen.
    pub fn unrender(&self, component: &Handle) {
        let address = component_address(component);
        if let Some(node) = self.rendered.lock().unwrap().remove(&address) {
            self.nodes.lock().unwrap().remove(&opaque_address(&node));
        }
    }

    /// Sets what the host's tooling currently points at.
    pub fn inspect(&self, node: Option<Opaque>) {
        *self.inspected.lock().unwrap() = node;
    }

    pub fn was_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

fn component_address(component: &Handle) -> usize {
    component
        .as_instance()
        .map(opaque_address)
        .expect("test components are instances")
}

impl HostFramework for MockHost {
    fn handle_from_component(&self, component: &Handle) -> Option<Handle> {
        let address = component.as_instance().map(opaque_address)?;
        self.framework.lock().unwrap().get(&address).cloned()
    }

    fn handle_from_host_node(&self, node: &Opaque) -> Option<Handle> {
        self.nodes.lock().unwrap().get(&opaque_address(node)).cloned()
    }

    fn host_node_from_handle(&self, handle: &Handle) -> Option<Opaque> {
        let address = handle.as_instance().map(opaque_address)?;
        self.rendered.lock().unwrap().get(&address).cloned()
    }

    fn inspected_host_node(&self) -> Option<Opaque> {
        self.inspected.lock().unwrap().clone()
    }

    fn detach_instrumentation(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Update capability
// ---------------------------------------------------------------------------

/// Public instance exposed by [`CountingUpdater`].
#[derive(Debug)]
pub struct PublicInstance {
    pub name: String,
}

/// Update capability that counts re-render requests.
pub struct CountingUpdater {
    pub force_updates: AtomicUsize,
    pub patches: Mutex<Vec<Value>>,
    pub instance: Opaque,
    pub working: bool,
}

impl CountingUpdater {
    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, true)
    }

    /// An updater that cannot re-render.
    pub fn broken(name: &str) -> Arc<Self> {
        Self::build(name, false)
    }

    fn build(name: &str, working: bool) -> Arc<Self> {
        Arc::new(Self {
            force_updates: AtomicUsize::new(0),
            patches: Mutex::new(Vec::new()),
            instance: Arc::new(PublicInstance {
                name: name.to_string(),
            }),
            working,
        })
    }

    pub fn count(&self) -> usize {
        self.force_updates.load(Ordering::SeqCst)
    }
}

impl UpdateCapability for CountingUpdater {
    fn set_state(&self, patch: Value) {
        self.patches.lock().unwrap().push(patch);
    }

    fn force_update(&self) {
        self.force_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn can_force_update(&self) -> bool {
        self.working
    }

    fn public_instance(&self) -> Option<Opaque> {
        Some(self.instance.clone())
    }
}

// ---------------------------------------------------------------------------
// Backend helpers
// ---------------------------------------------------------------------------

/// A backend wired to a fresh mock host.
pub fn backend_with_host() -> (Arc<Backend>, Arc<MockHost>) {
    let host = MockHost::new();
    let backend = Backend::with_host(TreelensConfig::default(), host.clone());
    (backend, host)
}

/// Records every local event the backend emits.
pub fn record_events(backend: &Backend) -> Arc<Mutex<Vec<BackendEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    backend.on(Arc::new(move |event: &BackendEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

/// Names of the recorded events, in order.
pub fn event_names(events: &Mutex<Vec<BackendEvent>>) -> Vec<&'static str> {
    events.lock().unwrap().iter().map(BackendEvent::name).collect()
}

/// Takes every frame currently queued on a channel bridge.
pub fn drain(frames: &mut mpsc::UnboundedReceiver<BridgeFrame>) -> Vec<BridgeFrame> {
    let mut out = Vec::new();
    while let Ok(frame) = frames.try_recv() {
        out.push(frame);
    }
    out
}

/// Generate a unique session name for test isolation.
pub fn unique_session_name() -> String {
    format!(
        "test_{}",
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    )
}
