use chairside_proto::{Endpoint, ProtocolError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::invocation::InvocationId;
use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Why an invocation ended in `Failed`. Every variant is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum InvocationError {
    #[error("Not connected to the automation backend; reconnect required")]
    NotConnected,

    #[error("Another request is already running ({endpoint})")]
    AlreadyRunning { endpoint: Endpoint },

    #[error("Connection to the automation backend was lost")]
    ConnectionLost,

    #[error("Request was cancelled")]
    Cancelled,

    #[error("{message}")]
    Backend { message: String },
}

impl InvocationError {
    pub fn backend(message: impl Into<String>) -> Self {
        InvocationError::Backend {
            message: message.into(),
        }
    }
}

impl From<&TransportError> for InvocationError {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::NotConnected => InvocationError::NotConnected,
            TransportError::ConnectFailed(_)
            | TransportError::ConnectTimeout(_)
            | TransportError::SendFailed(_)
            | TransportError::Protocol(_) => InvocationError::ConnectionLost,
        }
    }
}

impl From<TransportError> for InvocationError {
    fn from(err: TransportError) -> Self {
        Self::from(&err)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool_name}: {message}")]
    InvalidArguments { tool_name: String, message: String },

    #[error("Unknown invocation: {0}")]
    UnknownInvocation(InvocationId),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Bridge shutting down")]
    ShuttingDown,

    #[error("Channel closed")]
    ChannelClosed,
}

impl BridgeError {
    pub fn invalid_arguments(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::InvalidArguments {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}
