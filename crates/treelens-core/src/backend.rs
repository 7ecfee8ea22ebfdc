//! The backend: lifecycle bookkeeping for a live component tree.
//!
//! The host framework reports mounts, updates and unmounts here. Each call
//! resolves the component's id, updates the shadow tree and emits one
//! normalized event. Mutations ([`crate::mutation`]), selection
//! ([`crate::selection`]) and bridge wiring ([`crate::relay`]) extend
//! [`Backend`] in their own modules.
//!
//! # Concurrency
//!
//! The registry, node store and selection state sit behind one coarse lock.
//! The lock is never held while events are emitted or while host code runs,
//! so listeners and host callbacks may call back into the backend. Events
//! raised from inside a listener are queued and delivered after the current
//! one, so every listener and the bridge see one global order. Protocol
//! ordering across threads assumes calls are serialized, as they are when the
//! host drives the backend from its single UI thread.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use treelens_core::backend::Backend;
//! use treelens_core::config::TreelensConfig;
//! use treelens_core::handle::{Handle, Opaque};
//! use treelens_core::host::HostFramework;
//! use treelens_core::record::NodeRecord;
//!
//! struct NoTree;
//!
//! impl HostFramework for NoTree {
//!     fn handle_from_component(&self, _: &Handle) -> Option<Handle> { None }
//!     fn handle_from_host_node(&self, _: &Opaque) -> Option<Handle> { None }
//!     fn host_node_from_handle(&self, _: &Handle) -> Option<Opaque> { None }
//! }
//!
//! let backend = Backend::with_host(TreelensConfig::default(), Arc::new(NoTree));
//! let app = Handle::instance(Arc::new("App"));
//! let id = backend
//!     .record_mount(&app, NodeRecord::composite("App").with_state(json!({"count": 0})))
//!     .unwrap();
//! backend.add_root(&app);
//! assert!(backend.is_root(&id));
//! ```

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::config::TreelensConfig;
use crate::error::BackendError;
use crate::events::{BackendEvent, Emitter, Listener, ListenerId};
use crate::handle::{Handle, NodeId};
use crate::host::HostFramework;
use crate::record::{NodeProjection, NodeRecord};
use crate::registry::IdentityRegistry;
use crate::relay::AttachedBridge;
use crate::selection::SelectionState;
use crate::store::NodeStore;

/// State guarded by the backend's coarse lock.
#[derive(Default)]
pub(crate) struct BackendState {
    pub(crate) registry: IdentityRegistry,
    pub(crate) store: NodeStore,
    pub(crate) selection: SelectionState,
    /// Handles of unmounted components, forgotten once their `unmount` is out.
    unmounted: Vec<(Handle, NodeId)>,
}

impl BackendState {
    /// Projection of the stored record for `id`.
    pub(crate) fn project(&mut self, id: &NodeId) -> Option<NodeProjection> {
        let BackendState { registry, store, .. } = self;
        let record = store.get(id)?;
        Some(record.project(id.clone(), |child| registry.get_id(child)))
    }

    fn forget_unmounted(&mut self) {
        for (handle, id) in std::mem::take(&mut self.unmounted) {
            // The handle may have been mounted again under the same id.
            if self.registry.lookup(&handle).as_ref() == Some(&id) && !self.store.contains(&id) {
                self.registry.forget(&handle);
            }
        }
    }
}

/// In-process introspection backend for one component tree.
pub struct Backend {
    pub(crate) config: TreelensConfig,
    pub(crate) state: Mutex<BackendState>,
    pub(crate) host: RwLock<Option<Arc<dyn HostFramework>>>,
    pub(crate) emitter: Emitter,
    pub(crate) bridge: Mutex<Option<AttachedBridge>>,
    pub(crate) bridge_generation: AtomicU64,
}

impl Backend {
    /// Creates a backend with no host framework injected yet.
    pub fn new(config: TreelensConfig) -> Arc<Self> {
        let emitter = Emitter::new(config.event_capacity);
        Arc::new(Self {
            config,
            state: Mutex::new(BackendState::default()),
            host: RwLock::new(None),
            emitter,
            bridge: Mutex::new(None),
            bridge_generation: AtomicU64::new(0),
        })
    }

    /// Creates a backend with its host framework already injected.
    pub fn with_host(config: TreelensConfig, host: Arc<dyn HostFramework>) -> Arc<Self> {
        let backend = Self::new(config);
        backend.inject_host(host);
        backend
    }

    /// Injects (or replaces) the host framework capabilities.
    pub fn inject_host(&self, host: Arc<dyn HostFramework>) {
        *self.host.write().unwrap_or_else(PoisonError::into_inner) = Some(host);
        debug!("host framework injected");
    }

    pub fn has_host(&self) -> bool {
        self.host.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn config(&self) -> &TreelensConfig {
        &self.config
    }

    /// The injected host, or a loud failure if wiring is incomplete.
    pub(crate) fn host(&self) -> Result<Arc<dyn HostFramework>, BackendError> {
        let host = self.host.read().unwrap_or_else(PoisonError::into_inner).clone();
        host.ok_or_else(|| {
            error!("backend used before the host framework was injected");
            BackendError::HostNotInjected
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a synchronous listener for local events.
    pub fn on(&self, listener: Listener) -> ListenerId {
        self.emitter.on(listener)
    }

    pub fn off(&self, listener: ListenerId) -> bool {
        self.emitter.off(listener)
    }

    /// Subscribes to local events through a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.emitter.subscribe()
    }

    pub(crate) fn emit(&self, event: BackendEvent) {
        if self.emitter.emit(event) {
            self.lock().forget_unmounted();
        }
    }

    /// Returns the id of `handle`, minting one if needed.
    pub fn get_id(&self, handle: &Handle) -> NodeId {
        self.lock().registry.get_id(handle)
    }

    /// Records a newly mounted component and emits `mount`.
    ///
    /// The component's framework-level tree handle is indexed so UI nodes can
    /// later be mapped back to it.
    ///
    /// # Errors
    ///
    /// - [`BackendError::HostNotInjected`] if no host framework is wired yet
    pub fn record_mount(&self, handle: &Handle, record: NodeRecord) -> Result<NodeId, BackendError> {
        let host = self.host()?;
        let root_handle = host.handle_from_component(handle);

        let projection = {
            let mut state = self.lock();
            let BackendState { registry, store, .. } = &mut *state;
            let id = registry.get_id(handle);
            let projection = record.project(id.clone(), |child| registry.get_id(child));
            store.insert(id.clone(), record);
            if let Some(root_handle) = root_handle {
                store.index_root_handle(&id, root_handle.key());
            }
            projection
        };

        let id = projection.id.clone();
        debug!(%id, name = ?projection.name, "mount");
        self.emit(BackendEvent::Mount(projection));
        Ok(id)
    }

    /// Replaces the record of a mounted component and emits `update`.
    ///
    /// Updates for components that are not mounted are dropped, so an
    /// `update` never precedes its `mount`.
    pub fn record_update(&self, handle: &Handle, record: NodeRecord) -> Option<NodeId> {
        let projection = {
            let mut state = self.lock();
            let BackendState { registry, store, .. } = &mut *state;
            let Some(id) = registry.lookup(handle).filter(|id| store.contains(id)) else {
                debug!("update for a component that is not mounted");
                return None;
            };
            let projection = record.project(id.clone(), |child| registry.get_id(child));
            store.insert(id, record);
            projection
        };

        let id = projection.id.clone();
        self.emit(BackendEvent::Update(projection));
        Some(id)
    }

    /// Re-snapshots the stored record for `id` and emits `update`.
    pub(crate) fn emit_update(&self, id: &NodeId) -> bool {
        let Some(projection) = self.lock().project(id) else {
            return false;
        };
        self.emit(BackendEvent::Update(projection));
        true
    }

    /// Removes an unmounted component and emits `unmount`.
    ///
    /// The event goes out while the id still resolves. The handle is
    /// forgotten once every queued event has been delivered.
    pub fn record_unmount(&self, handle: &Handle) -> Option<NodeId> {
        let id = {
            let mut state = self.lock();
            let id = state.registry.lookup(handle)?;
            if state.store.remove(&id).is_none() {
                state.registry.forget(handle);
                return None;
            }
            state.selection.release(&id);
            state.unmounted.push((handle.clone(), id.clone()));
            id
        };

        debug!(%id, "unmount");
        self.emit(BackendEvent::Unmount(id.clone()));
        Some(id)
    }

    /// Marks a mounted component as a tree entry point and emits `root`.
    pub fn add_root(&self, handle: &Handle) -> Option<NodeId> {
        let (id, added) = {
            let mut state = self.lock();
            let id = state
                .registry
                .lookup(handle)
                .filter(|id| state.store.contains(id))?;
            let added = state.store.add_root(&id);
            (id, added)
        };

        if added {
            debug!(%id, "root");
            self.emit(BackendEvent::Root(id.clone()));
        }
        Some(id)
    }

    /// Root ids in the order they were added.
    pub fn roots(&self) -> Vec<NodeId> {
        self.lock().store.roots().to_vec()
    }

    pub fn is_root(&self, id: &NodeId) -> bool {
        self.lock().store.is_root(id)
    }

    /// True while a record exists for `id`.
    pub fn is_mounted(&self, id: &NodeId) -> bool {
        self.lock().store.contains(id)
    }

    /// Number of mounted components.
    pub fn mounted_count(&self) -> usize {
        self.lock().store.len()
    }

    /// Current wire projection of a mounted component.
    pub fn projection(&self, id: &NodeId) -> Option<NodeProjection> {
        self.lock().project(id)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("config", &self.config)
            .field("state", &"<Mutex<BackendState>>")
            .field("host", &self.has_host())
            .field("emitter", &"<Emitter>")
            .field("bridge", &self.has_bridge())
            .finish()
    }
}
