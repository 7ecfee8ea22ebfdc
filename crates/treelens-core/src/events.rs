//! Local event emitter.
//!
//! Every backend event is delivered twice: synchronously to registered
//! listeners (in registration order), then to the broadcast channel for
//! asynchronous subscribers. The bridge adapter is a synchronous listener so
//! protocol ordering never depends on a receiver keeping up.
//!
//! Delivery runs to completion: an event emitted while another is being
//! delivered (by a listener calling back into the backend, or by another
//! thread) is queued and delivered afterwards, so every listener observes
//! the same global order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::handle::{NodeId, Opaque};
use crate::record::NodeProjection;

/// Events emitted by the backend.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// A mounted component is a tree entry point.
    Root(NodeId),
    /// A component mounted.
    Mount(NodeProjection),
    /// A component re-rendered or was mutated from outside.
    Update(NodeProjection),
    /// A component unmounted. Its id is still resolvable while this is handled.
    Unmount(NodeId),
    /// The local UI asks the inspector to select a component.
    SetSelection(NodeId),
    /// The inspector selected a component.
    Selected(NodeId),
    /// Draw a highlight over a UI node.
    Highlight {
        node: Opaque,
        name: Option<String>,
    },
    /// Draw highlights over several UI nodes.
    HighlightMany { nodes: Vec<Opaque> },
    HideHighlight,
    /// The inspector is going away.
    Shutdown,
}

impl BackendEvent {
    /// Short static name, suitable for span and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            BackendEvent::Root(_) => "root",
            BackendEvent::Mount(_) => "mount",
            BackendEvent::Update(_) => "update",
            BackendEvent::Unmount(_) => "unmount",
            BackendEvent::SetSelection(_) => "setSelection",
            BackendEvent::Selected(_) => "selected",
            BackendEvent::Highlight { .. } => "highlight",
            BackendEvent::HighlightMany { .. } => "highlightMany",
            BackendEvent::HideHighlight => "hideHighlight",
            BackendEvent::Shutdown => "shutdown",
        }
    }
}

/// Synchronous event listener.
pub type Listener = Arc<dyn Fn(&BackendEvent) + Send + Sync>;

/// Identifies a registered listener for [`Emitter::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Delivery {
    delivering: bool,
    queue: VecDeque<BackendEvent>,
}

/// Clears the delivering flag if a listener panics mid-delivery.
struct DeliveryGuard<'a>(&'a Mutex<Delivery>);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).delivering = false;
        }
    }
}

/// Fan-out of [`BackendEvent`]s to listeners and subscribers.
pub struct Emitter {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    delivery: Mutex<Delivery>,
    event_tx: broadcast::Sender<BackendEvent>,
}

impl Emitter {
    /// Creates an emitter whose broadcast channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            delivery: Mutex::new(Delivery::default()),
            event_tx,
        }
    }

    /// Registers a synchronous listener.
    pub fn on(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Subscribes to events. Slow receivers may observe
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.event_tx.subscribe()
    }

    /// Delivers `event` to every listener, then to subscribers.
    ///
    /// If a delivery is already in progress the event is queued behind it
    /// and delivered by the emitting call that is already draining the
    /// queue. Listeners run with no emitter lock held, so they may register
    /// or remove listeners and emit further events.
    ///
    /// Returns true if this call drained the queue, false if the event was
    /// left for the delivery in progress.
    pub fn emit(&self, event: BackendEvent) -> bool {
        {
            let mut delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
            delivery.queue.push_back(event);
            if delivery.delivering {
                return false;
            }
            delivery.delivering = true;
        }

        let _guard = DeliveryGuard(&self.delivery);
        loop {
            let next = {
                let mut delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
                match delivery.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        delivery.delivering = false;
                        return true;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, event: BackendEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
        // No subscribers is expected
        let _ = self.event_tx.send(event);
    }
}
