//! The bridge runtime: a single actor that owns all correlation state and
//! the transport, driven through a cloneable [`BridgeHandle`].

pub mod effect;
pub mod event;
pub mod handle;
pub mod machine;
mod runtime;
pub mod subscription;

pub use effect::{Dispatch, Effect};
pub use event::BridgeEvent;
pub use handle::{BridgeHandle, BridgeService, InvokeReceipt};
pub use machine::BridgeCore;
pub use subscription::{BridgeEventEnvelope, BridgeEventSubscription};
