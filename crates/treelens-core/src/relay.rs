//! Bridge adapter: wires the backend's local events to a [`Bridge`] and the
//! bridge's inbound commands back into the backend.
//!
//! At most one bridge is attached at a time; a second attach is rejected
//! until the first is detached. Handlers left registered on a detached bridge
//! become inert.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, debug_span, info, warn};

use crate::backend::{Backend, BackendState};
use crate::bridge::Bridge;
use crate::error::BackendError;
use crate::events::{BackendEvent, ListenerId};
use crate::mutation::MutationTarget;
use crate::protocol::{InboundCommand, InboundEvent, OutboundMessage};

/// The bridge currently attached to a backend.
pub(crate) struct AttachedBridge {
    bridge: Arc<dyn Bridge>,
    listener: ListenerId,
    generation: u64,
}

/// Translates a local event into bridge traffic.
fn forward(bridge: &dyn Bridge, event: &BackendEvent) {
    match event {
        BackendEvent::Root(id) => bridge.send(OutboundMessage::Root { id: id.clone() }),
        BackendEvent::Mount(node) => bridge.send(OutboundMessage::Mount(node.clone())),
        BackendEvent::Update(node) => bridge.send(OutboundMessage::Update(node.clone())),
        BackendEvent::Unmount(id) => {
            bridge.send(OutboundMessage::Unmount { id: id.clone() });
            bridge.forget(id);
        }
        BackendEvent::SetSelection(id) => bridge.send(OutboundMessage::Select { id: id.clone() }),
        _ => {}
    }
}

/// Holds live events back from a new bridge until its replay is sent.
struct ReplayGate {
    held: Mutex<Option<Vec<BackendEvent>>>,
}

impl ReplayGate {
    fn new(closed: bool) -> Self {
        Self {
            held: Mutex::new(closed.then(Vec::new)),
        }
    }

    /// Returns true if `event` should be forwarded now; otherwise keeps it.
    fn pass(&self, event: &BackendEvent) -> bool {
        match self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(held) => {
                held.push(event.clone());
                false
            }
            None => true,
        }
    }

    /// Forwards everything held back, then lets events through directly.
    fn open(&self, bridge: &dyn Bridge) {
        loop {
            let batch = {
                let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
                match held.as_mut() {
                    Some(events) if !events.is_empty() => std::mem::take(events),
                    _ => {
                        *held = None;
                        return;
                    }
                }
            };
            for event in &batch {
                forward(bridge, event);
            }
        }
    }
}

/// `mount` for every live record, children first, then `root`s.
fn replay_messages(state: &mut BackendState) -> Vec<OutboundMessage> {
    let BackendState { registry, store, .. } = state;
    let order = store.mount_order(|record| {
        record
            .children
            .iter()
            .filter_map(|child| registry.lookup(child))
            .collect()
    });

    let mut messages: Vec<OutboundMessage> = order
        .iter()
        .filter_map(|id| {
            let record = store.get(id)?;
            Some(OutboundMessage::Mount(
                record.project(id.clone(), |child| registry.get_id(child)),
            ))
        })
        .collect();
    messages.extend(
        store
            .roots()
            .iter()
            .map(|id| OutboundMessage::Root { id: id.clone() }),
    );
    messages
}

impl Backend {
    /// Attaches `bridge` and wires both directions.
    ///
    /// With `replay_on_attach` set, the bridge first receives a `mount` for
    /// every live component (children before parents) and a `root` for every
    /// root, so a late inspector starts from a consistent tree. The replay is
    /// taken in the same step that subscribes the bridge to live events, and
    /// events raised while the replay is being sent follow it.
    ///
    /// # Errors
    ///
    /// - [`BackendError::BridgeAlreadyAttached`] if another bridge is attached
    pub fn attach_bridge(self: &Arc<Self>, bridge: Arc<dyn Bridge>) -> Result<(), BackendError> {
        let mut slot = self.bridge.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!("rejecting a second bridge while one is attached");
            return Err(BackendError::BridgeAlreadyAttached);
        }
        let generation = self.bridge_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let backend = Arc::downgrade(self);
        for event in InboundEvent::ALL {
            let backend = backend.clone();
            bridge.on(
                event,
                Arc::new(move |command: InboundCommand| {
                    let Some(backend) = backend.upgrade() else {
                        return;
                    };
                    if backend.is_current_bridge(generation) {
                        backend.handle_command(command);
                    } else {
                        debug!(event = event.name(), "ignoring command from a detached bridge");
                    }
                }),
            );
        }

        let replay = self.config.replay_on_attach;
        let gate = Arc::new(ReplayGate::new(replay));
        let (messages, listener) = {
            let mut state = self.lock();
            let messages = if replay {
                replay_messages(&mut state)
            } else {
                Vec::new()
            };
            let outbound = bridge.clone();
            let gate = gate.clone();
            let listener = self.emitter.on(Arc::new(move |event: &BackendEvent| {
                if gate.pass(event) {
                    forward(outbound.as_ref(), event);
                }
            }));
            (messages, listener)
        };

        *slot = Some(AttachedBridge {
            bridge: bridge.clone(),
            listener,
            generation,
        });
        drop(slot);
        info!(generation, "bridge attached");

        if replay {
            debug!(count = messages.len(), "replaying tree to new bridge");
            for message in messages {
                bridge.send(message);
            }
            gate.open(bridge.as_ref());
        }
        Ok(())
    }

    /// Detaches the current bridge, if any, and returns it.
    pub fn detach_bridge(&self) -> Option<Arc<dyn Bridge>> {
        let attached = self
            .bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        self.emitter.off(attached.listener);
        info!(generation = attached.generation, "bridge detached");
        Some(attached.bridge)
    }

    pub fn has_bridge(&self) -> bool {
        self.bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn is_current_bridge(&self, generation: u64) -> bool {
        self.bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|attached| attached.generation == generation)
    }

    /// Runs one inbound command.
    ///
    /// Failures are reported to local diagnostics only; the inspector gets
    /// no reply.
    pub fn handle_command(&self, command: InboundCommand) {
        let span = debug_span!("inbound", command = command.event().name());
        let _enter = span.enter();

        match command {
            InboundCommand::SetState(request) => {
                self.apply_mutation(&request.id, MutationTarget::State, &request.path, request.value);
            }
            InboundCommand::SetProps(request) => {
                self.apply_mutation(&request.id, MutationTarget::Props, &request.path, request.value);
            }
            InboundCommand::SetContext(request) => {
                self.apply_mutation(&request.id, MutationTarget::Context, &request.path, request.value);
            }
            InboundCommand::MakeGlobal { id, path } => {
                self.make_global(&id, &path);
            }
            // Host errors are already logged where they occur.
            InboundCommand::Highlight { id } => {
                let _ = self.highlight(&id);
            }
            InboundCommand::HighlightMany { ids } => {
                let _ = self.highlight_many(&ids);
            }
            InboundCommand::HideHighlight => self.hide_highlight(),
            InboundCommand::Selected { id } => self.mark_selected(&id),
            InboundCommand::CheckSelection => {
                let _ = self.check_selection();
            }
            InboundCommand::Shutdown => self.shutdown(),
        }
    }

    /// Emits `shutdown` and lets the host remove its instrumentation.
    pub fn shutdown(&self) {
        info!("inspector shutdown");
        self.emit(BackendEvent::Shutdown);
        let host = self.host.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(host) = host {
            host.detach_instrumentation();
        }
    }
}
