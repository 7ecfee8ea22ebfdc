//! Identity registry: one opaque id per live component handle.
//!
//! The registry never keeps a component alive. Entries hold [`WeakOpaque`]
//! references, and cleanup is driven by explicit unmount notifications via
//! [`IdentityRegistry::forget`]. An entry whose handle was dropped without an
//! unmount is treated as absent.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handle::{opaque_address, weak_address, Handle, HandleKey, NodeId, WeakOpaque};

struct Entry {
    id: NodeId,
    handle: WeakOpaque,
}

/// Bidirectional, non-owning handle <-> id association.
#[derive(Default)]
pub struct IdentityRegistry {
    ids: HashMap<usize, Entry>,
    handles: HashMap<NodeId, WeakOpaque>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `handle`, minting one on first sight.
    ///
    /// Primitive handles are their own id and are never stored.
    pub fn get_id(&mut self, handle: &Handle) -> NodeId {
        let value = match handle {
            Handle::Primitive(text) => return NodeId::from(text.as_str()),
            Handle::Instance(value) => value,
        };
        if let Some(id) = self.lookup(handle) {
            return id;
        }

        let address = opaque_address(value);
        if let Some(stale) = self.ids.remove(&address) {
            self.handles.remove(&stale.id);
        }

        let id = NodeId::mint();
        let weak = Arc::downgrade(value);
        self.handles.insert(id.clone(), weak.clone());
        self.ids.insert(address, Entry { id: id.clone(), handle: weak });
        id
    }

    /// Returns the id for `handle` without minting one.
    pub fn lookup(&self, handle: &Handle) -> Option<NodeId> {
        match handle {
            Handle::Primitive(text) => Some(NodeId::from(text.as_str())),
            Handle::Instance(value) => {
                let entry = self.ids.get(&opaque_address(value))?;
                // A dead weak means the handle went away without an unmount.
                (entry.handle.strong_count() > 0).then(|| entry.id.clone())
            }
        }
    }

    /// Reverse lookup, only while the handle is still alive.
    pub fn handle_for(&self, id: &NodeId) -> Option<Handle> {
        self.handles.get(id)?.upgrade().map(Handle::Instance)
    }

    /// Drops both directions of the association for `handle`.
    pub fn forget(&mut self, handle: &Handle) {
        let HandleKey::Address(address) = handle.key() else {
            return;
        };
        if let Some(entry) = self.ids.remove(&address) {
            if self
                .handles
                .get(&entry.id)
                .is_some_and(|weak| weak_address(weak) == address)
            {
                self.handles.remove(&entry.id);
            }
        }
    }

    /// Number of tracked object handles.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
