//! Correlates agent tool calls with the asynchronous responses of an
//! automation backend that accepts one request at a time over a shared
//! channel.
//!
//! Leaves first: [`transport`] owns the connection, [`tracker`] guards
//! against duplicate dispatch, [`coordinator`] enforces single-flight,
//! [`correlator`] matches responses to invocations and [`registry`] is the
//! agent-facing tool surface. [`bridge`] ties them together in one actor.

pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod correlator;
pub mod error;
pub mod invocation;
pub mod registry;
pub mod state;
pub mod test_utils;
pub mod tracker;
pub mod transport;
pub mod utils;

pub use bridge::{
    BridgeEvent, BridgeEventEnvelope, BridgeEventSubscription, BridgeHandle, BridgeService,
    InvokeReceipt,
};
pub use config::BridgeConfig;
pub use error::{BridgeError, InvocationError, Result};
pub use invocation::{EndpointCall, InvocationId, InvocationState, ToolInvocation};
pub use registry::{PendingDescriptor, ToolInvocationRegistry, ToolSchema};
pub use state::{Activity, ChannelState, LogEntry, LogLevel};
pub use transport::{ChannelEvent, Transport, TransportChannel, TransportError};
