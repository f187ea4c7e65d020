use chairside_proto::{AgentMessagePayload, Endpoint, ScreenshotPayload};
use serde::Serialize;
use serde_json::Value;

use crate::invocation::{InvocationId, InvocationState, ToolInvocation};
use crate::state::{ChannelState, LogEntry};

/// Everything observers can see change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    InvocationRegistered {
        invocation: ToolInvocation,
    },
    InvocationChanged {
        id: InvocationId,
        state: InvocationState,
    },
    LogAppended {
        entry: LogEntry,
    },
    LogsCleared,
    ChannelStateChanged {
        state: ChannelState,
    },
    StaleResponseDiscarded {
        endpoint: Endpoint,
        running: Option<Endpoint>,
    },
    Screenshot {
        payload: ScreenshotPayload,
    },
    AgentMessage {
        payload: AgentMessagePayload,
    },
    AgentComplete {
        payload: Option<Value>,
    },
    BackendError {
        message: String,
    },
}

impl BridgeEvent {
    /// The invocation this event is about, if any.
    pub fn invocation_id(&self) -> Option<InvocationId> {
        match self {
            BridgeEvent::InvocationRegistered { invocation } => Some(invocation.id),
            BridgeEvent::InvocationChanged { id, .. } => Some(*id),
            _ => None,
        }
    }
}
