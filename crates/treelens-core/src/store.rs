//! The shadow tree: node records, roots and the root-handle index.

use std::collections::{HashMap, HashSet};

use crate::handle::{HandleKey, NodeId};
use crate::record::NodeRecord;

/// Latest known render state of every mounted component.
///
/// A record exists for an id exactly while that component is mounted.
#[derive(Default)]
pub struct NodeStore {
    records: HashMap<NodeId, NodeRecord>,
    roots: Vec<NodeId>,
    root_handles: HashMap<HandleKey, NodeId>,
    root_handle_of: HashMap<NodeId, HandleKey>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` under `id`, replacing any previous record.
    pub fn insert(&mut self, id: NodeId, record: NodeRecord) {
        self.records.insert(id, record);
    }

    /// Maps a framework-level tree handle to the component that owns it.
    pub fn index_root_handle(&mut self, id: &NodeId, key: HandleKey) {
        if let Some(previous) = self.root_handle_of.insert(id.clone(), key.clone()) {
            if previous != key {
                self.root_handles.remove(&previous);
            }
        }
        self.root_handles.insert(key, id.clone());
    }

    /// Removes the record and every index entry for `id`.
    pub fn remove(&mut self, id: &NodeId) -> Option<NodeRecord> {
        self.roots.retain(|root| root != id);
        if let Some(key) = self.root_handle_of.remove(id) {
            if self.root_handles.get(&key) == Some(id) {
                self.root_handles.remove(&key);
            }
        }
        self.records.remove(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&NodeRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.records.contains_key(id)
    }

    /// Adds `id` to the root set. Returns false if it was already a root.
    pub fn add_root(&mut self, id: &NodeId) -> bool {
        if self.roots.contains(id) {
            return false;
        }
        self.roots.push(id.clone());
        true
    }

    pub fn is_root(&self, id: &NodeId) -> bool {
        self.roots.contains(id)
    }

    /// Root ids in the order they were added.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Resolves a framework-level tree handle to its owning component.
    pub fn id_for_root_handle(&self, key: &HandleKey) -> Option<&NodeId> {
        self.root_handles.get(key)
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Orders live ids children-first from each root, then any records not
    /// reachable from a root. `child_ids` resolves a record's children.
    pub fn mount_order(&self, mut child_ids: impl FnMut(&NodeRecord) -> Vec<NodeId>) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.records.len());
        let mut seen = HashSet::new();
        for root in &self.roots {
            self.visit(root, &mut child_ids, &mut seen, &mut order);
        }
        let mut rest: Vec<&NodeId> = self.records.keys().filter(|id| !seen.contains(*id)).collect();
        rest.sort();
        for id in rest {
            self.visit(id, &mut child_ids, &mut seen, &mut order);
        }
        order
    }

    fn visit(
        &self,
        id: &NodeId,
        child_ids: &mut impl FnMut(&NodeRecord) -> Vec<NodeId>,
        seen: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) {
        let Some(record) = self.records.get(id) else {
            return;
        };
        if !seen.insert(id.clone()) {
            return;
        }
        for child in child_ids(record) {
            self.visit(&child, child_ids, seen, order);
        }
        order.push(id.clone());
    }
}
