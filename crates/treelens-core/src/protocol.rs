//! Bridge protocol messages.
//!
//! All messages are JSON objects tagged by a `type` field carrying the event
//! name. Outbound messages flow from the backend to the inspector, inbound
//! commands from the inspector to the backend. [`BridgeFrame`] wraps outbound
//! traffic for transports that also carry `forget` and error notices.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::PathKey;
use crate::handle::NodeId;
use crate::record::NodeProjection;

/// A message sent from the backend to the inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Root { id: NodeId },
    Mount(NodeProjection),
    Update(NodeProjection),
    Unmount { id: NodeId },
    /// Ask the inspector to select a component.
    Select { id: NodeId },
}

impl OutboundMessage {
    /// The id this message refers to.
    pub fn id(&self) -> &NodeId {
        match self {
            OutboundMessage::Root { id }
            | OutboundMessage::Unmount { id }
            | OutboundMessage::Select { id } => id,
            OutboundMessage::Mount(node) | OutboundMessage::Update(node) => &node.id,
        }
    }
}

/// Payload of `setState`, `setProps` and `setContext`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    pub id: NodeId,
    pub path: Vec<PathKey>,
    pub value: Value,
}

/// What `makeGlobal` reads: the component's public instance, or a path into
/// its record (`["state", "count"]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInspectPath", into = "RawInspectPath")]
pub enum InspectPath {
    Instance,
    Keys(Vec<PathKey>),
}

const INSTANCE_PATH: &str = "instance";

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawInspectPath {
    Named(String),
    Keys(Vec<PathKey>),
}

impl TryFrom<RawInspectPath> for InspectPath {
    type Error = String;

    fn try_from(raw: RawInspectPath) -> Result<Self, Self::Error> {
        match raw {
            RawInspectPath::Named(name) if name == INSTANCE_PATH => Ok(InspectPath::Instance),
            RawInspectPath::Named(name) => Err(format!("unknown inspect path {name:?}")),
            RawInspectPath::Keys(keys) => Ok(InspectPath::Keys(keys)),
        }
    }
}

impl From<InspectPath> for RawInspectPath {
    fn from(path: InspectPath) -> Self {
        match path {
            InspectPath::Instance => RawInspectPath::Named(INSTANCE_PATH.to_string()),
            InspectPath::Keys(keys) => RawInspectPath::Keys(keys),
        }
    }
}

/// A command sent from the inspector to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundCommand {
    SetState(MutationRequest),
    SetProps(MutationRequest),
    SetContext(MutationRequest),
    MakeGlobal { id: NodeId, path: InspectPath },
    Highlight { id: NodeId },
    HighlightMany { ids: Vec<NodeId> },
    HideHighlight,
    Selected { id: NodeId },
    /// Poll the host for the node under inspection.
    CheckSelection,
    Shutdown,
}

impl InboundCommand {
    pub fn event(&self) -> InboundEvent {
        match self {
            InboundCommand::SetState(_) => InboundEvent::SetState,
            InboundCommand::SetProps(_) => InboundEvent::SetProps,
            InboundCommand::SetContext(_) => InboundEvent::SetContext,
            InboundCommand::MakeGlobal { .. } => InboundEvent::MakeGlobal,
            InboundCommand::Highlight { .. } => InboundEvent::Highlight,
            InboundCommand::HighlightMany { .. } => InboundEvent::HighlightMany,
            InboundCommand::HideHighlight => InboundEvent::HideHighlight,
            InboundCommand::Selected { .. } => InboundEvent::Selected,
            InboundCommand::CheckSelection => InboundEvent::CheckSelection,
            InboundCommand::Shutdown => InboundEvent::Shutdown,
        }
    }
}

/// Names of inbound commands, used to register bridge handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundEvent {
    SetState,
    SetProps,
    SetContext,
    MakeGlobal,
    Highlight,
    HighlightMany,
    HideHighlight,
    Selected,
    CheckSelection,
    Shutdown,
}

impl InboundEvent {
    pub const ALL: [InboundEvent; 10] = [
        InboundEvent::SetState,
        InboundEvent::SetProps,
        InboundEvent::SetContext,
        InboundEvent::MakeGlobal,
        InboundEvent::Highlight,
        InboundEvent::HighlightMany,
        InboundEvent::HideHighlight,
        InboundEvent::Selected,
        InboundEvent::CheckSelection,
        InboundEvent::Shutdown,
    ];

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::SetState => "setState",
            InboundEvent::SetProps => "setProps",
            InboundEvent::SetContext => "setContext",
            InboundEvent::MakeGlobal => "makeGlobal",
            InboundEvent::Highlight => "highlight",
            InboundEvent::HighlightMany => "highlightMany",
            InboundEvent::HideHighlight => "hideHighlight",
            InboundEvent::Selected => "selected",
            InboundEvent::CheckSelection => "checkSelection",
            InboundEvent::Shutdown => "shutdown",
        }
    }
}

/// Outbound traffic of a stream transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeFrame {
    /// A protocol message.
    Event { event: OutboundMessage },
    /// The backend no longer knows `id`; drop any id-keyed caches.
    Forget { id: NodeId },
    /// The transport refused or failed a request.
    Error { message: String },
}
