//! Errors surfaced by the backend.

use thiserror::Error;

/// Errors returned by backend operations.
///
/// Unresolvable ids, handles and nodes are not errors: those operations
/// return `None` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// An operation needed the host framework before it was injected.
    #[error("host framework capabilities have not been injected")]
    HostNotInjected,

    /// A bridge is already attached; detach it first.
    #[error("a bridge is already attached to this backend")]
    BridgeAlreadyAttached,
}
