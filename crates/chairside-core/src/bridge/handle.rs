use std::collections::BTreeMap;
use std::time::Duration;

use chairside_proto::Endpoint;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::event::BridgeEvent;
use super::machine::BridgeCore;
use super::runtime::{BridgeActor, BridgeCmd};
use super::subscription::BridgeEventSubscription;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::invocation::{InvocationId, InvocationState, ToolInvocation};
use crate::registry::{PendingDescriptor, ToolInvocationRegistry};
use crate::state::{ChannelState, LogEntry};
use crate::transport::{Transport, TransportChannel};

/// What `invoke` hands back: the new invocation and its provisional result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvokeReceipt {
    pub invocation: ToolInvocation,
    pub descriptor: PendingDescriptor,
}

#[derive(Clone)]
pub struct BridgeHandle {
    cmd_tx: mpsc::Sender<BridgeCmd>,
    state_rx: watch::Receiver<ChannelState>,
}

impl BridgeHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> BridgeCmd,
    ) -> Result<T, BridgeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        reply_rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    pub async fn connect(&self) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCmd::Connect { reply }).await?
    }

    /// Drop the current connection, if any, and open a fresh one.
    pub async fn reconnect(&self) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCmd::Reconnect { reply }).await?
    }

    pub async fn disconnect(&self) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCmd::Disconnect { reply }).await
    }

    /// Register an agent tool call. Returns as soon as the invocation exists;
    /// the backend call is dispatched afterwards.
    pub async fn invoke(
        &self,
        tool_name: impl Into<String>,
        arguments: Value,
    ) -> Result<InvokeReceipt, BridgeError> {
        let tool_name = tool_name.into();
        self.request(|reply| BridgeCmd::Invoke {
            tool_name,
            arguments,
            reply,
        })
        .await?
    }

    /// Ask for an invocation to be dispatched. Safe to call any number of
    /// times; only the first call for an id reaches the backend.
    pub async fn ensure_dispatched(&self, id: InvocationId) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCmd::EnsureDispatched { id, reply })
            .await?
    }

    /// Run an endpoint directly, outside any tool invocation.
    pub async fn run(
        &self,
        endpoint: Endpoint,
        params: BTreeMap<String, String>,
    ) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCmd::Run {
            endpoint,
            params,
            reply,
        })
        .await?
    }

    pub async fn stop(&self) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCmd::Stop { reply }).await
    }

    pub async fn start_agent(&self, task: Option<String>) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCmd::StartAgent { task, reply })
            .await?
    }

    pub async fn invocation_state(
        &self,
        id: InvocationId,
    ) -> Result<Option<InvocationState>, BridgeError> {
        self.request(|reply| BridgeCmd::GetInvocationState { id, reply })
            .await
    }

    pub async fn logs(&self) -> Result<Vec<LogEntry>, BridgeError> {
        self.request(|reply| BridgeCmd::GetLogs { reply }).await
    }

    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    pub async fn subscribe(&self) -> Result<BridgeEventSubscription, BridgeError> {
        self.request(|reply| BridgeCmd::Subscribe { reply }).await
    }

    /// Wait until the invocation reaches `Completed` or `Failed`.
    pub async fn wait_for_terminal(
        &self,
        id: InvocationId,
        timeout: Duration,
    ) -> Result<InvocationState, BridgeError> {
        // Subscribe before reading the current state so no transition can
        // fall between the two.
        let mut subscription = self.subscribe().await?;
        let state = self
            .invocation_state(id)
            .await?
            .ok_or(BridgeError::UnknownInvocation(id))?;
        if state.is_terminal() {
            return Ok(state);
        }

        let wait = async {
            loop {
                match subscription.rx.recv().await {
                    Ok(envelope) => match envelope.event {
                        BridgeEvent::InvocationChanged { id: changed, state }
                            if changed == id && state.is_terminal() =>
                        {
                            return Ok(state);
                        }
                        _ => {}
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The terminal transition may be among the dropped events.
                        tracing::debug!(invocation_id = %id, skipped, "Waiter lagged, re-reading state");
                        let state = self
                            .invocation_state(id)
                            .await?
                            .ok_or(BridgeError::UnknownInvocation(id))?;
                        if state.is_terminal() {
                            return Ok(state);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(BridgeError::ShuttingDown);
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| BridgeError::Timeout(format!("invocation {id}")))?
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.try_send(BridgeCmd::Shutdown);
    }
}

/// The running bridge: the actor task plus a handle to it.
pub struct BridgeService {
    pub handle: BridgeHandle,
    task: JoinHandle<()>,
}

impl BridgeService {
    pub fn spawn(
        config: &BridgeConfig,
        registry: ToolInvocationRegistry,
        transport: impl Transport,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(ChannelState::default());

        let core = BridgeCore::new(registry, config.max_log_entries);
        let actor = BridgeActor::new(
            core,
            TransportChannel::new(transport),
            config.connect_timeout(),
            config.event_buffer,
            state_tx,
        );
        let task = tokio::spawn(actor.run(cmd_rx));

        tracing::debug!(ws_url = %config.ws_url, "Bridge service spawned");

        Self {
            handle: BridgeHandle { cmd_tx, state_rx },
            task,
        }
    }

    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.handle.cmd_tx.send(BridgeCmd::Shutdown).await;
        let _ = self.task.await;
    }
}
