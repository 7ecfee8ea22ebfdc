//! Node records: the backend's shadow snapshot of a mounted component.
//!
//! A [`NodeRecord`] is what the host framework hands to the backend on mount
//! and update. It carries internal references (the element type and the
//! update capability) that never leave the process; [`NodeProjection`] is the
//! serializable view sent to a remote inspector.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::handle::{Handle, NodeId, Opaque};

/// Kind of node in the host framework's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeType {
    /// A user-defined component with its own state.
    #[default]
    Composite,
    /// A platform element (a view, a DOM node...).
    Native,
    /// A text run.
    Text,
    /// A framework-internal wrapper around the top-level element.
    Wrapper,
    /// Renders nothing.
    Empty,
}

/// Re-render hooks supplied by a component.
///
/// `force_update` only requests a render; the backend emits the resulting
/// `update` event itself, so hosts should not report a render triggered this
/// way a second time.
pub trait UpdateCapability: Send + Sync {
    /// Merges `patch` into the component's state and schedules a render.
    fn set_state(&self, patch: Value);

    /// Re-renders the component from its current data.
    fn force_update(&self);

    /// Whether [`force_update`](Self::force_update) actually does anything.
    fn can_force_update(&self) -> bool {
        true
    }

    /// The component's public instance, for ad-hoc inspection.
    fn public_instance(&self) -> Option<Opaque>;
}

/// Render state of one mounted component.
#[derive(Clone, Default)]
pub struct NodeRecord {
    pub node_type: NodeType,
    pub name: Option<String>,
    pub key: Option<String>,
    /// The host's element type. Internal; never serialized.
    pub element_type: Option<Opaque>,
    pub text: Option<String>,
    pub state: Option<Document>,
    pub props: Option<Document>,
    pub context: Option<Document>,
    pub children: Vec<Handle>,
    /// Internal; never serialized.
    pub updater: Option<Arc<dyn UpdateCapability>>,
}

impl NodeRecord {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            ..Self::default()
        }
    }

    /// A composite component record with a display name.
    pub fn composite(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(NodeType::Composite)
        }
    }

    /// A text node record.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(NodeType::Text)
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the state document. Pass a shared [`Document`] to let mutations
    /// reach the component's live state.
    pub fn with_state(mut self, state: impl Into<Document>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_props(mut self, props: impl Into<Document>) -> Self {
        self.props = Some(props.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<Document>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Handle>) -> Self {
        self.children = children;
        self
    }

    pub fn with_element_type(mut self, element_type: Opaque) -> Self {
        self.element_type = Some(element_type);
        self
    }

    pub fn with_updater(mut self, updater: Arc<dyn UpdateCapability>) -> Self {
        self.updater = Some(updater);
        self
    }

    /// True if the component can be re-rendered on request.
    pub fn can_update(&self) -> bool {
        self.updater.as_ref().is_some_and(|u| u.can_force_update())
    }

    /// Builds the wire projection, resolving each child to its id.
    pub fn project(&self, id: NodeId, mut child_id: impl FnMut(&Handle) -> NodeId) -> NodeProjection {
        NodeProjection {
            id,
            node_type: self.node_type,
            name: self.name.clone(),
            key: self.key.clone(),
            text: self.text.clone(),
            state: self.state.as_ref().map(Document::snapshot),
            props: self.props.as_ref().map(Document::snapshot),
            context: self.context.as_ref().map(Document::snapshot),
            children: self.children.iter().map(&mut child_id).collect(),
            can_update: self.can_update(),
        }
    }
}

impl fmt::Debug for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRecord")
            .field("node_type", &self.node_type)
            .field("name", &self.name)
            .field("key", &self.key)
            .field("text", &self.text)
            .field("state", &self.state)
            .field("props", &self.props)
            .field("context", &self.context)
            .field("children", &self.children.len())
            .field("updater", &self.updater.as_ref().map(|_| "<UpdateCapability>"))
            .finish()
    }
}

/// Serializable view of a [`NodeRecord`], as sent in `mount` and `update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProjection {
    pub id: NodeId,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    pub can_update: bool,
}
