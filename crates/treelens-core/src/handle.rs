//! Opaque component handles and backend-minted ids.
//!
//! The host framework owns every component instance. The backend only ever
//! sees them as [`Handle`]s: either a shared reference to some host object, or
//! a primitive string that identifies itself (text children, for example).

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Any host-owned object: component instances, framework handles, UI nodes.
pub type Opaque = Arc<dyn Any + Send + Sync>;

/// Non-owning counterpart of [`Opaque`].
pub type WeakOpaque = Weak<dyn Any + Send + Sync>;

/// Returns the allocation address of a host object, used as its identity.
pub fn opaque_address(value: &Opaque) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

/// Returns the allocation address behind a weak host reference.
pub fn weak_address(value: &WeakOpaque) -> usize {
    Weak::as_ptr(value) as *const () as usize
}

/// A reference to a live component as seen by the backend.
#[derive(Clone, Debug)]
pub enum Handle {
    /// A host object, identified by its allocation.
    Instance(Opaque),
    /// A self-identifying primitive; its text is its id.
    Primitive(String),
}

impl Handle {
    /// Wraps a host object.
    pub fn instance<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        let opaque: Opaque = value;
        Handle::Instance(opaque)
    }

    /// Wraps a primitive identity.
    pub fn primitive(text: impl Into<String>) -> Self {
        Handle::Primitive(text.into())
    }

    /// Identity key of this handle: two handles with the same key are the
    /// same component.
    pub fn key(&self) -> HandleKey {
        match self {
            Handle::Instance(value) => HandleKey::Address(opaque_address(value)),
            Handle::Primitive(text) => HandleKey::Primitive(text.clone()),
        }
    }

    /// Returns the host object, if this is not a primitive.
    pub fn as_instance(&self) -> Option<&Opaque> {
        match self {
            Handle::Instance(value) => Some(value),
            Handle::Primitive(_) => None,
        }
    }

    /// Returns true if both handles refer to the same component.
    pub fn same_as(&self, other: &Handle) -> bool {
        self.key() == other.key()
    }
}

impl From<Opaque> for Handle {
    fn from(value: Opaque) -> Self {
        Handle::Instance(value)
    }
}

/// Hashable identity of a [`Handle`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandleKey {
    Address(usize),
    Primitive(String),
}

/// Process-unique identity of a mounted component, as used on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Mints a fresh random id.
    pub fn mint() -> Self {
        NodeId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let component = Arc::new(5u32);
        let a = Handle::instance(component.clone());
        let b = Handle::instance(component);
        assert!(a.same_as(&b));
    }

    #[test]
    fn equal_values_are_distinct_handles() {
        let a = Handle::instance(Arc::new(String::from("counter")));
        let b = Handle::instance(Arc::new(String::from("counter")));
        assert!(!a.same_as(&b));
    }

    #[test]
    fn primitives_compare_by_text() {
        assert!(Handle::primitive("hello").same_as(&Handle::primitive("hello")));
        assert!(Handle::primitive("hello").as_instance().is_none());
    }

    #[test]
    fn minted_ids_differ() {
        assert_ne!(NodeId::mint(), NodeId::mint());
    }

    #[test]
    fn node_id_serializes_as_plain_string() {
        let id = NodeId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
