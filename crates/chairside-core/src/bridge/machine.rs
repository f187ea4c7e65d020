use std::collections::BTreeMap;

use chairside_proto::{ApiData, Command, Endpoint, InboundEvent};
use serde_json::Value;

use super::effect::{Dispatch, Effect};
use super::event::BridgeEvent;
use crate::coordinator::SingleFlightCoordinator;
use crate::correlator::{Correlated, ResponseCorrelator};
use crate::error::{BridgeError, InvocationError};
use crate::invocation::{InvocationId, InvocationState, ToolInvocation};
use crate::registry::{PendingDescriptor, ToolInvocationRegistry};
use crate::state::{Activity, ChannelState, LogBook};
use crate::tracker::RequestTracker;
use crate::transport::{ChannelEvent, TransportError};

/// Synchronous state machine behind the bridge runtime.
///
/// Every input returns the effects it implies; nothing here performs I/O.
/// Channel state changes are always emitted before the invocation changes
/// they cause, so an observer woken by a terminal invocation already sees
/// the freed channel.
pub struct BridgeCore {
    channel: ChannelState,
    logs: LogBook,
    tracker: RequestTracker,
    coordinator: SingleFlightCoordinator,
    correlator: ResponseCorrelator,
    registry: ToolInvocationRegistry,
}

impl BridgeCore {
    pub fn new(registry: ToolInvocationRegistry, max_log_entries: usize) -> Self {
        Self {
            channel: ChannelState::default(),
            logs: LogBook::with_capacity(max_log_entries),
            tracker: RequestTracker::new(),
            coordinator: SingleFlightCoordinator::new(),
            correlator: ResponseCorrelator::new(),
            registry,
        }
    }

    pub fn channel(&self) -> &ChannelState {
        &self.channel
    }

    pub fn logs(&self) -> &LogBook {
        &self.logs
    }

    pub fn registry(&self) -> &ToolInvocationRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    pub fn invocation_state(&self, id: InvocationId) -> Option<InvocationState> {
        self.registry.state(id)
    }

    /// Register a tool call and schedule its dispatch.
    pub fn invoke(
        &mut self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<(ToolInvocation, PendingDescriptor, Vec<Effect>), BridgeError> {
        let (invocation, descriptor) = self.registry.invoke(tool_name, arguments)?;
        self.tracker.track(invocation.id);

        let effects = vec![
            Effect::Emit(BridgeEvent::InvocationRegistered {
                invocation: invocation.clone(),
            }),
            Effect::Fire(invocation.id),
        ];
        Ok((invocation, descriptor, effects))
    }

    /// Observer re-evaluation. Dispatches the invocation unless it already
    /// fired.
    pub fn ensure_dispatched(&mut self, id: InvocationId) -> Result<Vec<Effect>, BridgeError> {
        if self.registry.get(id).is_none() {
            return Err(BridgeError::UnknownInvocation(id));
        }
        Ok(self.fire(id))
    }

    pub fn fire(&mut self, id: InvocationId) -> Vec<Effect> {
        let Some(call) = self.registry.get(id).map(|invocation| invocation.call.clone()) else {
            tracing::warn!(invocation_id = %id, "Fire requested for unknown invocation");
            return Vec::new();
        };

        let endpoint = call.endpoint.clone();
        let channel = &mut self.channel;
        let logs = &mut self.logs;
        let coordinator = &mut self.coordinator;
        let Some(result) = self
            .tracker
            .fire_once(id, || coordinator.run(channel, logs, call.endpoint, call.params))
        else {
            return Vec::new();
        };

        match result {
            Ok(command) => {
                self.correlator.bind(endpoint.clone(), Some(id));
                let mut effects = self.channel_changed();
                effects.push(Effect::Emit(BridgeEvent::LogsCleared));
                effects.extend(self.mark_running(id));
                effects.push(Effect::Send {
                    command,
                    dispatch: Some(Dispatch {
                        endpoint,
                        invocation: Some(id),
                    }),
                });
                effects
            }
            Err(error) => {
                tracing::info!(invocation_id = %id, error = %error, "Dispatch refused");
                self.resolve(id, Err(error)).into_iter().collect()
            }
        }
    }

    /// Run an endpoint directly, without a tool invocation.
    pub fn run(
        &mut self,
        endpoint: Endpoint,
        params: BTreeMap<String, String>,
    ) -> Result<Vec<Effect>, InvocationError> {
        let command =
            self.coordinator
                .run(&mut self.channel, &mut self.logs, endpoint.clone(), params)?;
        self.correlator.bind(endpoint.clone(), None);

        let mut effects = self.channel_changed();
        effects.push(Effect::Emit(BridgeEvent::LogsCleared));
        effects.push(Effect::Send {
            command,
            dispatch: Some(Dispatch {
                endpoint,
                invocation: None,
            }),
        });
        Ok(effects)
    }

    pub fn stop(&mut self) -> Vec<Effect> {
        let (stopped, command) = self.coordinator.stop(&mut self.channel);

        let mut effects = Vec::new();
        if stopped.is_some() {
            effects.extend(self.channel_changed());
        }
        if let Some((id, error)) = self.correlator.on_stop() {
            effects.extend(self.resolve(id, Err(error)));
        }
        if let Some(command) = command {
            effects.push(Effect::Send {
                command,
                dispatch: None,
            });
        }
        effects
    }

    pub fn start_agent(&mut self, task: Option<String>) -> Result<Vec<Effect>, InvocationError> {
        if !self.channel.is_connected {
            return Err(InvocationError::NotConnected);
        }
        tracing::info!(has_task = task.is_some(), "Starting agent");
        Ok(vec![Effect::Send {
            command: Command::StartAgent { task },
            dispatch: None,
        }])
    }

    pub fn connecting(&mut self) -> Vec<Effect> {
        self.channel.activity = Activity::Connecting;
        self.channel_changed()
    }

    pub fn connect_failed(&mut self, error: &TransportError) -> Vec<Effect> {
        tracing::warn!(error = %error, "Connection attempt failed");
        self.channel.is_connected = false;
        self.channel.activity = Activity::Error;
        self.channel.last_status_message = Some(error.to_string());
        self.channel_changed()
    }

    /// A command never reached the wire. Rolls back the run it belonged to.
    pub fn send_failed(&mut self, dispatch: Option<Dispatch>, error: TransportError) -> Vec<Effect> {
        let Some(dispatch) = dispatch else {
            tracing::warn!(error = %error, "Failed to send command");
            return Vec::new();
        };

        tracing::warn!(endpoint = %dispatch.endpoint, error = %error, "Failed to send run command");
        let mut effects = Vec::new();
        if self.coordinator.abort(&mut self.channel).is_some() {
            effects.extend(self.channel_changed());
        }
        self.correlator.unbind();
        if let Some(id) = dispatch.invocation {
            effects.extend(self.resolve(id, Err(InvocationError::from(error))));
        }
        effects
    }

    pub fn handle(&mut self, event: ChannelEvent) -> Vec<Effect> {
        match event {
            ChannelEvent::Connected => {
                self.channel.is_connected = true;
                if !self.channel.is_running() {
                    self.channel.activity = Activity::Idle;
                }
                self.channel_changed()
            }
            ChannelEvent::Disconnected { reason } => self.disconnected(reason),
            ChannelEvent::Rejected(error) => {
                tracing::debug!(error = %error, "Rejected frame ignored");
                Vec::new()
            }
            ChannelEvent::Inbound(event) => self.inbound(event),
        }
    }

    fn disconnected(&mut self, reason: String) -> Vec<Effect> {
        let was_connected = self.channel.is_connected;
        let interrupted = self.coordinator.disconnected(&mut self.channel);

        let mut effects = Vec::new();
        if was_connected || interrupted.is_some() {
            self.channel.last_status_message = Some(reason);
            effects.extend(self.channel_changed());
        }
        if let Some((id, error)) = self.correlator.on_disconnect() {
            effects.extend(self.resolve(id, Err(error)));
        }
        effects
    }

    fn inbound(&mut self, event: InboundEvent) -> Vec<Effect> {
        match event {
            InboundEvent::Status(status) => {
                tracing::debug!(status = ?status.status, message = ?status.message, "Backend status");
                self.channel.backend_status = Some(status.status);
                self.channel.last_status_message = status.message;
                self.channel_changed()
            }
            InboundEvent::Log(payload) => {
                let entry = self.correlator.on_log(&self.channel, &mut self.logs, payload);
                vec![Effect::Emit(BridgeEvent::LogAppended { entry })]
            }
            InboundEvent::Response(response) => {
                match self.correlator.on_response(&self.channel, response) {
                    Correlated::Matched {
                        invocation,
                        outcome,
                        ..
                    } => {
                        self.coordinator.complete(&mut self.channel);
                        let mut effects = self.channel_changed();
                        if let Some(id) = invocation {
                            effects.extend(self.resolve(id, outcome));
                        }
                        effects
                    }
                    Correlated::Stale { endpoint, running } => {
                        vec![Effect::Emit(BridgeEvent::StaleResponseDiscarded {
                            endpoint,
                            running,
                        })]
                    }
                }
            }
            InboundEvent::Screenshot(payload) => {
                vec![Effect::Emit(BridgeEvent::Screenshot { payload })]
            }
            InboundEvent::Message(payload) => {
                vec![Effect::Emit(BridgeEvent::AgentMessage { payload })]
            }
            InboundEvent::AgentComplete(payload) => {
                vec![Effect::Emit(BridgeEvent::AgentComplete { payload })]
            }
            InboundEvent::Error(payload) => {
                tracing::warn!(message = %payload.message, "Backend reported an error");
                vec![Effect::Emit(BridgeEvent::BackendError {
                    message: payload.message,
                })]
            }
        }
    }

    fn mark_running(&mut self, id: InvocationId) -> Option<Effect> {
        let state = self.registry.mark_running(id)?;
        Some(Effect::Emit(BridgeEvent::InvocationChanged { id, state }))
    }

    fn resolve(
        &mut self,
        id: InvocationId,
        outcome: Result<ApiData, InvocationError>,
    ) -> Option<Effect> {
        let state = self.registry.resolve(id, outcome)?;
        Some(Effect::Emit(BridgeEvent::InvocationChanged { id, state }))
    }

    fn channel_changed(&self) -> Vec<Effect> {
        vec![Effect::Emit(BridgeEvent::ChannelStateChanged {
            state: self.channel.clone(),
        })]
    }
}
