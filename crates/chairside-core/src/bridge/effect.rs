use chairside_proto::{Command, Endpoint};

use super::event::BridgeEvent;
use crate::invocation::InvocationId;

/// The run a `run_api` command belongs to, so a failed send can be rolled
/// back against the right state.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub endpoint: Endpoint,
    pub invocation: Option<InvocationId>,
}

/// Side effects produced by [`super::machine::BridgeCore`] and carried out by the
/// runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send {
        command: Command,
        dispatch: Option<Dispatch>,
    },
    /// Ask for the invocation to be dispatched on a later loop turn.
    Fire(InvocationId),
    Emit(BridgeEvent),
}
