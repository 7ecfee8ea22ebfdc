//! Path-addressed writes into component data, and read-only inspection.
//!
//! A mutation walks one of a component's documents (state, props or
//! context), assigns the final path segment, asks the component to
//! re-render, and re-broadcasts the record as an `update`. Paths that no
//! longer resolve are expected after concurrent unmounts and are silently
//! dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::document::{get_in, Document, PathKey};
use crate::handle::{NodeId, Opaque};
use crate::protocol::InspectPath;
use crate::record::NodeRecord;

/// Which document of a component a mutation writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationTarget {
    State,
    Props,
    Context,
}

impl MutationTarget {
    pub fn name(&self) -> &'static str {
        match self {
            MutationTarget::State => "state",
            MutationTarget::Props => "props",
            MutationTarget::Context => "context",
        }
    }

    fn document(self, record: &NodeRecord) -> Option<&Document> {
        match self {
            MutationTarget::State => record.state.as_ref(),
            MutationTarget::Props => record.props.as_ref(),
            MutationTarget::Context => record.context.as_ref(),
        }
    }
}

/// What became of a mutation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Written, re-rendered and re-broadcast.
    Applied,
    /// The id, the document or an intermediate path segment is gone.
    Unresolved,
    /// The component cannot be re-rendered from outside.
    Unsupported,
}

/// A value exposed for ad-hoc inspection by `makeGlobal`.
#[derive(Debug, Clone)]
pub enum Inspected {
    Value(Value),
    Instance(Opaque),
}

impl Backend {
    /// Writes `value` at `path` inside the `target` document of `id`.
    ///
    /// On success the component's `force_update` runs exactly once and an
    /// `update` carrying the new data is emitted before this returns. The
    /// target is resolved before the update capability is checked, so a stale
    /// path is `Unresolved` whether or not the component can re-render.
    pub fn apply_mutation(
        &self,
        id: &NodeId,
        target: MutationTarget,
        path: &[PathKey],
        value: Value,
    ) -> MutationOutcome {
        let (document, updater) = {
            let state = self.lock();
            let Some(record) = state.store.get(id) else {
                debug!(%id, target = target.name(), "mutation target is not mounted");
                return MutationOutcome::Unresolved;
            };
            let Some(document) = target.document(record).cloned() else {
                debug!(%id, target = target.name(), "component has no such document");
                return MutationOutcome::Unresolved;
            };
            if !document.can_set(path) {
                debug!(%id, target = target.name(), ?path, "mutation path does not resolve");
                return MutationOutcome::Unresolved;
            }
            let updater = match &record.updater {
                Some(updater) if updater.can_force_update() => updater.clone(),
                _ => {
                    warn!(
                        %id,
                        name = ?record.name,
                        target = target.name(),
                        "component does not support external mutation"
                    );
                    return MutationOutcome::Unsupported;
                }
            };
            (document, updater)
        };

        // The document is shared with the host and may have changed since.
        if !document.set(path, value) {
            debug!(%id, target = target.name(), ?path, "mutation path does not resolve");
            return MutationOutcome::Unresolved;
        }

        updater.force_update();
        self.emit_update(id);
        MutationOutcome::Applied
    }

    pub fn set_state(&self, id: &NodeId, path: &[PathKey], value: Value) -> MutationOutcome {
        self.apply_mutation(id, MutationTarget::State, path, value)
    }

    pub fn set_props(&self, id: &NodeId, path: &[PathKey], value: Value) -> MutationOutcome {
        self.apply_mutation(id, MutationTarget::Props, path, value)
    }

    pub fn set_context(&self, id: &NodeId, path: &[PathKey], value: Value) -> MutationOutcome {
        self.apply_mutation(id, MutationTarget::Context, path, value)
    }

    /// Reads a value out of a component and binds it to the `$tmp` slot.
    ///
    /// [`InspectPath::Instance`] reads the public instance off the update
    /// capability; a key path is walked over the component's projection, so
    /// its first key names a field such as `state` or `props`. Never mutates.
    pub fn make_global(&self, id: &NodeId, path: &InspectPath) -> Option<Inspected> {
        let inspected = match path {
            InspectPath::Instance => {
                let updater = self.lock().store.get(id)?.updater.clone()?;
                Inspected::Instance(updater.public_instance()?)
            }
            InspectPath::Keys(keys) => {
                let projection = self.projection(id)?;
                let value = serde_json::to_value(&projection).ok()?;
                Inspected::Value(get_in(&value, keys)?.clone())
            }
        };

        info!(%id, value = ?inspected, "$tmp");
        self.lock().selection.tmp = Some(inspected.clone());
        Some(inspected)
    }

    /// The value most recently exposed by [`make_global`](Self::make_global).
    pub fn inspected_value(&self) -> Option<Inspected> {
        self.lock().selection.tmp.clone()
    }
}
