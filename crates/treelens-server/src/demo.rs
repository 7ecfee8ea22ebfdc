//! A toy component framework used to drive the backend.
//!
//! The demo tree is an `App` root holding a `Counter`, a `Greeting` and a
//! text label. Component data lives in shared [`Document`]s, so edits made
//! by an inspector land directly in the component's state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tracing::{debug, info};

use treelens_core::backend::Backend;
use treelens_core::document::{Document, PathKey};
use treelens_core::error::BackendError;
use treelens_core::handle::{opaque_address, Handle, Opaque};
use treelens_core::host::HostFramework;
use treelens_core::record::{NodeRecord, UpdateCapability};

/// A component instance of the demo framework.
#[derive(Debug)]
pub struct DemoComponent {
    pub name: &'static str,
    pub state: Document,
    pub props: Document,
    renders: AtomicUsize,
}

impl DemoComponent {
    fn new(name: &'static str, state: Value, props: Value) -> Arc<Self> {
        Arc::new(Self {
            name,
            state: Document::new(state),
            props: Document::new(props),
            renders: AtomicUsize::new(0),
        })
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

/// The framework's internal per-component bookkeeping object.
#[derive(Debug)]
struct Fiber;

/// What the demo "draws" for a component.
#[derive(Debug)]
pub struct ScreenNode {
    pub label: String,
}

/// Lets the backend re-render a demo component.
struct DemoUpdater {
    component: Arc<DemoComponent>,
}

impl UpdateCapability for DemoUpdater {
    fn set_state(&self, patch: Value) {
        if let Value::Object(fields) = patch {
            for (field, value) in fields {
                self.component.state.set(&[PathKey::Field(field)], value);
            }
        }
    }

    fn force_update(&self) {
        let renders = self.component.renders.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(component = self.component.name, renders, "forced re-render");
    }

    fn public_instance(&self) -> Option<Opaque> {
        Some(self.component.clone())
    }
}

#[derive(Default)]
struct Rendered {
    /// component address -> (fiber, screen node)
    by_component: HashMap<usize, (Handle, Opaque)>,
    /// screen node address -> fiber
    by_node: HashMap<usize, Handle>,
}

/// Host framework capabilities of the demo.
#[derive(Default)]
pub struct DemoFramework {
    rendered: Mutex<Rendered>,
    inspected: Mutex<Option<Opaque>>,
}

impl DemoFramework {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn render(&self, component: &Arc<DemoComponent>) {
        component.renders.fetch_add(1, Ordering::SeqCst);
        let fiber = Handle::instance(Arc::new(Fiber));
        let node: Opaque = Arc::new(ScreenNode {
            label: component.name.to_string(),
        });
        let instance: Opaque = component.clone();

        let mut rendered = self.rendered.lock().unwrap_or_else(PoisonError::into_inner);
        rendered.by_node.insert(opaque_address(&node), fiber.clone());
        rendered
            .by_component
            .insert(opaque_address(&instance), (fiber, node));
    }

    /// Screen node drawn for a component.
    pub fn screen_node(&self, component: &Arc<DemoComponent>) -> Option<Opaque> {
        let component: Opaque = component.clone();
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_component
            .get(&opaque_address(&component))
            .map(|(_, node)| node.clone())
    }

    /// Points the framework's own tooling at a screen node.
    pub fn inspect(&self, node: Option<Opaque>) {
        let label = node
            .as_ref()
            .and_then(|node| node.downcast_ref::<ScreenNode>())
            .map(|node| node.label.clone());
        debug!(?label, "framework tooling inspecting");
        *self.inspected.lock().unwrap_or_else(PoisonError::into_inner) = node;
    }
}

impl HostFramework for DemoFramework {
    fn handle_from_component(&self, component: &Handle) -> Option<Handle> {
        let address = component.as_instance().map(opaque_address)?;
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_component
            .get(&address)
            .map(|(fiber, _)| fiber.clone())
    }

    fn handle_from_host_node(&self, node: &Opaque) -> Option<Handle> {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_node
            .get(&opaque_address(node))
            .cloned()
    }

    fn host_node_from_handle(&self, handle: &Handle) -> Option<Opaque> {
        let address = handle.as_instance().map(opaque_address)?;
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_component
            .get(&address)
            .map(|(_, node)| node.clone())
    }

    fn inspected_host_node(&self) -> Option<Opaque> {
        self.inspected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn detach_instrumentation(&self) {
        info!("demo framework instrumentation removed");
    }
}

/// The mounted demo tree.
pub struct DemoApp {
    pub app: Arc<DemoComponent>,
    pub counter: Arc<DemoComponent>,
    pub greeting: Arc<DemoComponent>,
}

const LABEL: &str = "treelens demo";

fn record_for(component: &Arc<DemoComponent>) -> NodeRecord {
    NodeRecord::composite(component.name)
        .with_state(component.state.clone())
        .with_props(component.props.clone())
        .with_updater(Arc::new(DemoUpdater {
            component: component.clone(),
        }))
}

fn handle_of(component: &Arc<DemoComponent>) -> Handle {
    Handle::instance(component.clone())
}

impl DemoApp {
    /// Renders the demo tree and reports it to `backend`, children first.
    pub fn mount(backend: &Backend, framework: &DemoFramework) -> Result<Self, BackendError> {
        let app = DemoComponent::new("App", json!({"theme": "light"}), json!({}));
        let counter = DemoComponent::new("Counter", json!({"count": 0}), json!({"step": 1}));
        let greeting = DemoComponent::new(
            "Greeting",
            json!({"visible": true}),
            json!({"name": "world"}),
        );

        for component in [&app, &counter, &greeting] {
            framework.render(component);
        }

        let label = Handle::primitive(LABEL);
        backend.record_mount(&label, NodeRecord::text(LABEL))?;
        backend.record_mount(&handle_of(&counter), record_for(&counter))?;
        backend.record_mount(&handle_of(&greeting), record_for(&greeting))?;
        backend.record_mount(
            &handle_of(&app),
            record_for(&app).with_children(vec![
                handle_of(&counter),
                handle_of(&greeting),
                label,
            ]),
        )?;
        backend.add_root(&handle_of(&app));
        info!(components = backend.mounted_count(), "demo tree mounted");

        Ok(Self {
            app,
            counter,
            greeting,
        })
    }

    /// Finds a mounted demo component by name.
    pub fn find(&self, name: &str) -> Option<&Arc<DemoComponent>> {
        [&self.app, &self.counter, &self.greeting]
            .into_iter()
            .find(|component| component.name == name)
    }

    /// Advances the counter the way a user click would, and reports the
    /// re-render.
    pub fn tick(&self, backend: &Backend) {
        let step = self
            .counter
            .props
            .get(&[PathKey::from("step")])
            .and_then(|step| step.as_i64())
            .unwrap_or(1);
        let count = self
            .counter
            .state
            .get(&[PathKey::from("count")])
            .and_then(|count| count.as_i64())
            .unwrap_or(0);
        self.counter
            .state
            .set(&[PathKey::from("count")], json!(count + step));
        self.counter.renders.fetch_add(1, Ordering::SeqCst);
        backend.record_update(&handle_of(&self.counter), record_for(&self.counter));
    }
}
