use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chairside_proto::Endpoint;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::effect::Effect;
use super::event::BridgeEvent;
use super::handle::InvokeReceipt;
use super::machine::BridgeCore;
use super::subscription::{BridgeEventEnvelope, BridgeEventSubscription, UnsubscribeSignal};
use crate::error::{BridgeError, InvocationError};
use crate::invocation::{InvocationId, InvocationState};
use crate::state::{ChannelState, LogEntry};
use crate::transport::{ChannelEvent, TransportChannel};

pub(crate) enum BridgeCmd {
    Connect {
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    Reconnect {
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Invoke {
        tool_name: String,
        arguments: Value,
        reply: oneshot::Sender<Result<InvokeReceipt, BridgeError>>,
    },
    EnsureDispatched {
        id: InvocationId,
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    Run {
        endpoint: Endpoint,
        params: BTreeMap<String, String>,
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    StartAgent {
        task: Option<String>,
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    GetInvocationState {
        id: InvocationId,
        reply: oneshot::Sender<Option<InvocationState>>,
    },
    GetLogs {
        reply: oneshot::Sender<Vec<LogEntry>>,
    },
    Subscribe {
        reply: oneshot::Sender<BridgeEventSubscription>,
    },
    Shutdown,
}

pub(crate) struct BridgeActor {
    core: BridgeCore,
    channel: TransportChannel,
    connect_timeout: Duration,
    state_tx: watch::Sender<ChannelState>,
    event_broadcast: broadcast::Sender<BridgeEventEnvelope>,
    next_seq: u64,
    subscriber_count: usize,
    unsubscribe_tx: mpsc::UnboundedSender<UnsubscribeSignal>,
    unsubscribe_rx: mpsc::UnboundedReceiver<UnsubscribeSignal>,
    fire_tx: mpsc::UnboundedSender<InvocationId>,
    fire_rx: mpsc::UnboundedReceiver<InvocationId>,
}

impl BridgeActor {
    pub(crate) fn new(
        core: BridgeCore,
        channel: TransportChannel,
        connect_timeout: Duration,
        event_buffer: usize,
        state_tx: watch::Sender<ChannelState>,
    ) -> Self {
        let (event_broadcast, _) = broadcast::channel(event_buffer.max(1));
        let (unsubscribe_tx, unsubscribe_rx) = mpsc::unbounded_channel();
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();

        Self {
            core,
            channel,
            connect_timeout,
            state_tx,
            event_broadcast,
            next_seq: 0,
            subscriber_count: 0,
            unsubscribe_tx,
            unsubscribe_rx,
            fire_tx,
            fire_rx,
        }
    }

    pub(crate) async fn run(mut self, mut cmd_rx: mpsc::Receiver<BridgeCmd>) {
        loop {
            tokio::select! {
                biased;

                Some(id) = self.fire_rx.recv() => {
                    let effects = self.core.fire(id);
                    self.apply(effects).await;
                }

                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::debug!("All bridge handles dropped");
                        self.disconnect("bridge stopped").await;
                        break;
                    };
                    if let BridgeCmd::Shutdown = cmd {
                        self.disconnect("bridge shutting down").await;
                        break;
                    }
                    self.handle_cmd(cmd).await;
                }

                event = self.channel.next_event() => {
                    let effects = self.core.handle(event);
                    self.apply(effects).await;
                }

                Some(UnsubscribeSignal) = self.unsubscribe_rx.recv() => {
                    self.subscriber_count = self.subscriber_count.saturating_sub(1);
                    tracing::debug!(
                        subscriber_count = self.subscriber_count,
                        "Subscriber disconnected"
                    );
                }
            }
        }

        tracing::debug!("Bridge actor stopped");
    }

    async fn handle_cmd(&mut self, cmd: BridgeCmd) {
        match cmd {
            BridgeCmd::Connect { reply } => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            BridgeCmd::Reconnect { reply } => {
                self.disconnect("reconnecting").await;
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            BridgeCmd::Disconnect { reply } => {
                self.disconnect("disconnected by client").await;
                let _ = reply.send(());
            }
            BridgeCmd::Invoke {
                tool_name,
                arguments,
                reply,
            } => {
                let result = match self.core.invoke(&tool_name, arguments) {
                    Ok((invocation, descriptor, effects)) => {
                        self.apply(effects).await;
                        Ok(InvokeReceipt {
                            invocation,
                            descriptor,
                        })
                    }
                    Err(e) => {
                        tracing::info!(tool_name = %tool_name, error = %e, "Tool call rejected");
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            BridgeCmd::EnsureDispatched { id, reply } => {
                let result = match self.core.ensure_dispatched(id) {
                    Ok(effects) => {
                        self.apply(effects).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            BridgeCmd::Run {
                endpoint,
                params,
                reply,
            } => {
                let result = match self.core.run(endpoint, params) {
                    Ok(effects) => match self.apply(effects).await {
                        Some(error) => Err(BridgeError::Invocation(error)),
                        None => Ok(()),
                    },
                    Err(error) => Err(BridgeError::Invocation(error)),
                };
                let _ = reply.send(result);
            }
            BridgeCmd::Stop { reply } => {
                let effects = self.core.stop();
                self.apply(effects).await;
                let _ = reply.send(());
            }
            BridgeCmd::StartAgent { task, reply } => {
                let result = match self.core.start_agent(task) {
                    Ok(effects) => match self.apply(effects).await {
                        Some(error) => Err(BridgeError::Invocation(error)),
                        None => Ok(()),
                    },
                    Err(error) => Err(BridgeError::Invocation(error)),
                };
                let _ = reply.send(result);
            }
            BridgeCmd::GetInvocationState { id, reply } => {
                let _ = reply.send(self.core.invocation_state(id));
            }
            BridgeCmd::GetLogs { reply } => {
                let _ = reply.send(self.core.logs().snapshot());
            }
            BridgeCmd::Subscribe { reply } => {
                let subscription = self.create_subscription();
                let _ = reply.send(subscription);
            }
            BridgeCmd::Shutdown => {}
        }
    }

    async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.channel.is_connected() {
            return Ok(());
        }

        let effects = self.core.connecting();
        self.apply(effects).await;

        match self.channel.connect(self.connect_timeout).await {
            Ok(event) => {
                let effects = self.core.handle(event);
                self.apply(effects).await;
                Ok(())
            }
            Err(e) => {
                let effects = self.core.connect_failed(&e);
                self.apply(effects).await;
                Err(BridgeError::Transport(e))
            }
        }
    }

    async fn disconnect(&mut self, reason: &str) {
        if self.channel.close().await {
            let effects = self.core.handle(ChannelEvent::Disconnected {
                reason: reason.to_string(),
            });
            self.apply(effects).await;
        }
    }

    /// Carry out effects in order. Returns the error of the first failed
    /// send, if any.
    async fn apply(&mut self, effects: Vec<Effect>) -> Option<InvocationError> {
        let mut queue = VecDeque::from(effects);
        let mut first_error = None;

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Emit(event) => self.emit(event),
                Effect::Fire(id) => {
                    if self.fire_tx.send(id).is_err() {
                        tracing::error!(invocation_id = %id, "Fire queue closed");
                    }
                }
                Effect::Send { command, dispatch } => {
                    if let Err(error) = self.channel.send(&command).await {
                        if first_error.is_none() {
                            first_error = Some(InvocationError::from(&error));
                        }
                        queue.extend(self.core.send_failed(dispatch, error));
                    }
                }
            }
        }

        first_error
    }

    fn emit(&mut self, event: BridgeEvent) {
        if let BridgeEvent::ChannelStateChanged { state } = &event {
            self.state_tx.send_replace(state.clone());
        }

        self.next_seq += 1;
        let envelope = BridgeEventEnvelope {
            seq: self.next_seq,
            event,
        };
        // No subscribers is not an error.
        let _ = self.event_broadcast.send(envelope);
    }

    fn create_subscription(&mut self) -> BridgeEventSubscription {
        self.subscriber_count += 1;
        tracing::debug!(
            subscriber_count = self.subscriber_count,
            "Subscriber connected"
        );
        BridgeEventSubscription::new(
            self.event_broadcast.subscribe(),
            self.unsubscribe_tx.clone(),
        )
    }
}
