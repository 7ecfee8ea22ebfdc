//! # treelens-core
//!
//! In-process introspection backend for a live component tree.
//!
//! The host framework reports the mount/update/unmount lifecycle of its
//! components; the backend gives every live component a stable opaque id,
//! keeps a shadow index of the tree, and speaks a two-way protocol with a
//! remote inspector that can read and mutate component state, props and
//! context, and request highlighting and selection.
//!
//! ## Modules
//!
//! - [`handle`] - Opaque component handles and backend-minted ids
//! - [`registry`] - Weak handle <-> id association
//! - [`document`] - Shared JSON documents and path-addressed access
//! - [`record`] - Node records, update capabilities and wire projections
//! - [`store`] - The shadow tree, roots and root-handle index
//! - [`backend`] - Lifecycle bookkeeping and the local event stream
//! - [`mutation`] - Path-addressed writes and `makeGlobal` reads
//! - [`selection`] - UI node to component mapping, highlight and selection
//! - [`relay`] - Bridge attachment and inbound command dispatch
//! - [`bridge`] - The bridge capability and an in-process channel bridge
//! - [`protocol`] - Wire messages
//! - [`host`] - Capabilities injected by the host framework
//! - [`ipc`] - Unix socket transport for the bridge
//! - [`poller`] - Timer-driven selection polling
//! - [`config`] - Persistent configuration
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use treelens_core::backend::Backend;
//! use treelens_core::bridge::ChannelBridge;
//! use treelens_core::config::TreelensConfig;
//!
//! let backend = Backend::new(TreelensConfig::load());
//! // backend.inject_host(Arc::new(MyFramework::new()));
//!
//! let (bridge, mut frames) = ChannelBridge::new();
//! backend.attach_bridge(bridge.clone()).unwrap();
//! while let Ok(frame) = frames.try_recv() {
//!     println!("{}", serde_json::to_string(&frame).unwrap());
//! }
//! ```

pub mod backend;
pub mod bridge;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod handle;
pub mod host;
pub mod ipc;
pub mod mutation;
pub mod poller;
pub mod protocol;
pub mod record;
pub mod registry;
pub mod relay;
pub mod selection;
pub mod store;
