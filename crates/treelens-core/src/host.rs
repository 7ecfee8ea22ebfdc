//! Capabilities the host framework injects into the backend.
//!
//! The backend never walks the host's internal tree itself. It asks the host
//! to translate between component handles, framework-level tree handles and
//! UI nodes. Every method answers `None` when there is no counterpart; that is
//! an expected race with tree mutation, never an error.

use crate::handle::{Handle, Opaque};

/// Tree-walking primitives supplied by the host framework.
pub trait HostFramework: Send + Sync {
    /// Framework-level tree handle owned by a component.
    fn handle_from_component(&self, component: &Handle) -> Option<Handle>;

    /// Framework-level tree handle behind a UI node.
    fn handle_from_host_node(&self, node: &Opaque) -> Option<Handle>;

    /// UI node currently rendered for a component.
    fn host_node_from_handle(&self, handle: &Handle) -> Option<Opaque>;

    /// UI node the user is currently pointing at in the host's own tooling,
    /// polled by `checkSelection`.
    fn inspected_host_node(&self) -> Option<Opaque> {
        None
    }

    /// Removes the host's instrumentation hook on shutdown.
    fn detach_instrumentation(&self) {}
}
