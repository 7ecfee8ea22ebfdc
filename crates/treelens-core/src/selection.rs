//! Selection tracking: UI nodes to components, highlights, and `$inspect`.
//!
//! Selection state is per backend. The previously inspected UI node is held
//! weakly and only compared by identity, so polling never keeps a node alive.

use std::sync::Arc;

use tracing::debug;

use crate::backend::Backend;
use crate::error::BackendError;
use crate::events::BackendEvent;
use crate::handle::{opaque_address, weak_address, NodeId, Opaque, WeakOpaque};
use crate::host::HostFramework;
use crate::mutation::Inspected;

/// Per-backend selection and inspection bindings.
#[derive(Default)]
pub(crate) struct SelectionState {
    /// Last UI node observed by `check_selection`.
    last_inspected: Option<WeakOpaque>,
    selected: Option<NodeId>,
    /// `$inspect`: public instance of the selected component.
    inspect: Option<Opaque>,
    /// `$tmp`: last value exposed by `makeGlobal`.
    pub(crate) tmp: Option<Inspected>,
}

impl SelectionState {
    /// Drops bindings that point at an unmounted component.
    pub(crate) fn release(&mut self, id: &NodeId) {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
            self.inspect = None;
        }
    }

    /// Records the inspected node. Returns false if it is the one seen last.
    fn observe(&mut self, node: Option<&Opaque>) -> bool {
        let previous = self.last_inspected.as_ref().map(weak_address);
        if previous == node.map(opaque_address) {
            return false;
        }
        self.last_inspected = node.map(Arc::downgrade);
        true
    }
}

impl Backend {
    /// Maps a UI node to the component owning its framework-level handle.
    ///
    /// # Errors
    ///
    /// - [`BackendError::HostNotInjected`] if no host framework is wired yet
    pub fn get_id_for_node(&self, node: &Opaque) -> Result<Option<NodeId>, BackendError> {
        let host = self.host()?;
        let Some(handle) = host.handle_from_host_node(node) else {
            return Ok(None);
        };
        Ok(self.lock().store.id_for_root_handle(&handle.key()).cloned())
    }

    /// Asks the inspector to select the component owning `node`.
    ///
    /// Emits `setSelection` (sent to the bridge as `select`) when the node
    /// resolves; otherwise does nothing.
    pub fn select_from_host_node(&self, node: &Opaque) -> Result<Option<NodeId>, BackendError> {
        let Some(id) = self.get_id_for_node(node)? else {
            debug!("UI node has no owning component");
            return Ok(None);
        };
        debug!(%id, "selecting from UI node");
        self.emit(BackendEvent::SetSelection(id.clone()));
        Ok(Some(id))
    }

    /// Polls the host for the UI node under inspection and selects its
    /// owner if the node changed since the last poll.
    ///
    /// Meant to be called repeatedly on a timer, see
    /// [`SelectionPoller`](crate::poller::SelectionPoller).
    pub fn check_selection(&self) -> Result<Option<NodeId>, BackendError> {
        let host = self.host()?;
        let current = host.inspected_host_node();
        if !self.lock().selection.observe(current.as_ref()) {
            return Ok(None);
        }
        match current {
            Some(node) => self.select_from_host_node(&node),
            None => Ok(None),
        }
    }

    /// Handles the inspector's `selected` command: remembers the selection,
    /// binds `$inspect` to the component's public instance and emits
    /// `selected`. Ids that are not mounted are ignored.
    pub fn mark_selected(&self, id: &NodeId) {
        let updater = {
            let state = self.lock();
            let Some(record) = state.store.get(id) else {
                debug!(%id, "ignoring selection of an unmounted component");
                return;
            };
            record.updater.clone()
        };
        let instance = updater.and_then(|updater| updater.public_instance());
        {
            let mut state = self.lock();
            // Host code ran unlocked; the component may be gone already.
            if !state.store.contains(id) {
                debug!(%id, "selected component unmounted before it was bound");
                return;
            }
            state.selection.selected = Some(id.clone());
            state.selection.inspect = instance;
        }
        self.emit(BackendEvent::Selected(id.clone()));
    }

    /// Id of the component the inspector last selected.
    pub fn selected(&self) -> Option<NodeId> {
        self.lock().selection.selected.clone()
    }

    /// `$inspect`: public instance of the selected component.
    pub fn selected_instance(&self) -> Option<Opaque> {
        self.lock().selection.inspect.clone()
    }

    /// Emits `highlight` for the UI node of `id`.
    ///
    /// Returns `Ok(false)` when the id no longer resolves to a live node.
    pub fn highlight(&self, id: &NodeId) -> Result<bool, BackendError> {
        let host = self.host()?;
        let Some((node, name)) = self.resolve_host_node(host.as_ref(), id) else {
            debug!(%id, "highlight target no longer resolves");
            return Ok(false);
        };
        self.emit(BackendEvent::Highlight { node, name });
        Ok(true)
    }

    /// Emits one `highlightMany` for every id that still resolves.
    ///
    /// Returns how many nodes were highlighted.
    pub fn highlight_many(&self, ids: &[NodeId]) -> Result<usize, BackendError> {
        let host = self.host()?;
        let nodes: Vec<Opaque> = ids
            .iter()
            .filter_map(|id| self.resolve_host_node(host.as_ref(), id))
            .map(|(node, _)| node)
            .collect();
        let count = nodes.len();
        if count > 0 {
            self.emit(BackendEvent::HighlightMany { nodes });
        }
        Ok(count)
    }

    pub fn hide_highlight(&self) {
        self.emit(BackendEvent::HideHighlight);
    }

    fn resolve_host_node(
        &self,
        host: &dyn HostFramework,
        id: &NodeId,
    ) -> Option<(Opaque, Option<String>)> {
        let (handle, name) = {
            let state = self.lock();
            let record = state.store.get(id)?;
            (state.registry.handle_for(id)?, record.name.clone())
        };
        Some((host.host_node_from_handle(&handle)?, name))
    }
}
