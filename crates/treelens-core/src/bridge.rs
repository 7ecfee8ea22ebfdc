//! The bridge: the backend's channel to a remote inspector.
//!
//! [`Bridge`] is the minimum capability surface the backend needs from a
//! transport. [`ChannelBridge`] is an in-process implementation: outbound
//! traffic goes into a tokio channel of [`BridgeFrame`]s and inbound commands
//! are delivered with [`ChannelBridge::dispatch`]. Transports such as the Unix
//! socket server in [`crate::ipc`] sit on top of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::handle::NodeId;
use crate::protocol::{BridgeFrame, InboundCommand, InboundEvent, OutboundMessage};

/// Handler for one kind of inbound command.
pub type CommandHandler = Arc<dyn Fn(InboundCommand) + Send + Sync>;

/// Message channel to a remote inspector. Order is preserved per direction.
pub trait Bridge: Send + Sync {
    /// Sends a message to the inspector.
    fn send(&self, message: OutboundMessage);

    /// Registers a handler for inbound commands of kind `event`.
    fn on(&self, event: InboundEvent, handler: CommandHandler);

    /// Tells the inspector side to drop anything it keyed by `id`.
    fn forget(&self, id: &NodeId);
}

/// A [`Bridge`] backed by an unbounded tokio channel.
pub struct ChannelBridge {
    frame_tx: mpsc::UnboundedSender<BridgeFrame>,
    handlers: Mutex<HashMap<InboundEvent, Vec<CommandHandler>>>,
}

impl ChannelBridge {
    /// Creates a bridge and the receiving end of its outbound frames.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<BridgeFrame>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(Self {
            frame_tx,
            handlers: Mutex::new(HashMap::new()),
        });
        (bridge, frame_rx)
    }

    /// Delivers an inbound command to its handlers.
    ///
    /// Returns false if nothing was registered for the command.
    pub fn dispatch(&self, command: InboundCommand) -> bool {
        let event = command.event();
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            debug!(event = event.name(), "no handler for inbound command");
            return false;
        }
        for handler in handlers {
            handler(command.clone());
        }
        true
    }

    /// Sends an error notice to the inspector side.
    pub fn report_error(&self, message: impl Into<String>) {
        self.push(BridgeFrame::Error {
            message: message.into(),
        });
    }

    fn push(&self, frame: BridgeFrame) {
        // The receiver is gone once the transport closed.
        let _ = self.frame_tx.send(frame);
    }
}

impl Bridge for ChannelBridge {
    fn send(&self, message: OutboundMessage) {
        self.push(BridgeFrame::Event { event: message });
    }

    fn on(&self, event: InboundEvent, handler: CommandHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event)
            .or_default()
            .push(handler);
    }

    fn forget(&self, id: &NodeId) {
        self.push(BridgeFrame::Forget { id: id.clone() });
    }
}
