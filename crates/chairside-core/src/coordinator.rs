use std::collections::BTreeMap;
use std::time::Instant;

use chairside_proto::{Command, Endpoint};

use crate::error::InvocationError;
use crate::state::{Activity, ChannelState, LogBook};

/// Allows a single backend command in flight on the shared channel.
///
/// The coordinator owns no state of its own beyond timing; it mutates the
/// [`ChannelState`] it is handed so there is exactly one copy of "what is
/// running".
#[derive(Debug, Default)]
pub struct SingleFlightCoordinator {
    started_at: Option<Instant>,
}

impl SingleFlightCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the channel for `endpoint` and build the command to send.
    ///
    /// Rejects rather than queues: a concurrent attempt fails with
    /// `AlreadyRunning`.
    pub fn run(
        &mut self,
        channel: &mut ChannelState,
        logs: &mut LogBook,
        endpoint: Endpoint,
        params: BTreeMap<String, String>,
    ) -> Result<Command, InvocationError> {
        if let Some(running) = channel.running_endpoint() {
            tracing::info!(
                requested = %endpoint,
                running = %running,
                "Rejecting run, another request is in flight"
            );
            return Err(InvocationError::AlreadyRunning {
                endpoint: running.clone(),
            });
        }

        if !channel.is_connected {
            tracing::info!(requested = %endpoint, "Rejecting run, channel is down");
            return Err(InvocationError::NotConnected);
        }

        tracing::info!(endpoint = %endpoint, params = ?params, "Running endpoint");
        channel.activity = Activity::Running(endpoint.clone());
        logs.clear();
        self.started_at = Some(Instant::now());

        Ok(Command::run_api(endpoint, params))
    }

    /// Roll back a claim whose command never made it onto the wire.
    pub fn abort(&mut self, channel: &mut ChannelState) -> Option<Endpoint> {
        let endpoint = self.release(channel)?;
        tracing::warn!(endpoint = %endpoint, "Run aborted before the command was sent");
        Some(endpoint)
    }

    /// Free the channel after the running endpoint produced its response.
    pub fn complete(&mut self, channel: &mut ChannelState) -> Option<Endpoint> {
        let elapsed = self.started_at.map(|started| started.elapsed());
        let endpoint = self.release(channel)?;
        tracing::info!(endpoint = %endpoint, elapsed = ?elapsed, "Endpoint completed");
        Some(endpoint)
    }

    /// Free the channel because the connection went away.
    pub fn disconnected(&mut self, channel: &mut ChannelState) -> Option<Endpoint> {
        channel.is_connected = false;
        let endpoint = self.release(channel)?;
        tracing::warn!(endpoint = %endpoint, "Connection lost while endpoint was running");
        Some(endpoint)
    }

    /// Optimistic cancellation: the channel is idle as soon as this returns,
    /// whether or not the backend acknowledges `stop_agent`.
    ///
    /// Returns the endpoint that was running and the command to send, if the
    /// channel is up.
    pub fn stop(&mut self, channel: &mut ChannelState) -> (Option<Endpoint>, Option<Command>) {
        let endpoint = self.release(channel);
        if let Some(endpoint) = &endpoint {
            tracing::info!(endpoint = %endpoint, "Stopping running endpoint");
        }
        let command = channel.is_connected.then_some(Command::StopAgent);
        (endpoint, command)
    }

    fn release(&mut self, channel: &mut ChannelState) -> Option<Endpoint> {
        self.started_at = None;
        match std::mem::replace(&mut channel.activity, Activity::Idle) {
            Activity::Running(endpoint) => Some(endpoint),
            other => {
                channel.activity = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LogEntry;
    use chairside_proto::ApiLogPayload;
    use rstest::rstest;

    fn connected() -> ChannelState {
        ChannelState {
            is_connected: true,
            ..ChannelState::default()
        }
    }

    fn log_entry(message: &str) -> LogEntry {
        LogEntry::from_payload(
            ApiLogPayload {
                message: message.to_string(),
                timestamp: 0.0,
                level: "info".to_string(),
            },
            None,
        )
    }

    #[test]
    fn run_claims_channel_and_clears_logs() {
        let mut coordinator = SingleFlightCoordinator::new();
        let mut channel = connected();
        let mut logs = LogBook::with_capacity(8);
        logs.push(log_entry("left over"));

        let command = coordinator
            .run(&mut channel, &mut logs, Endpoint::Reports, BTreeMap::new())
            .unwrap();

        assert_eq!(command, Command::run_api(Endpoint::Reports, BTreeMap::new()));
        assert!(channel.is_running_endpoint(&Endpoint::Reports));
        assert!(logs.is_empty());
    }

    #[rstest]
    #[case(Endpoint::Reports)]
    #[case(Endpoint::PatientChart)]
    fn second_run_is_rejected_with_running_endpoint(#[case] second: Endpoint) {
        let mut coordinator = SingleFlightCoordinator::new();
        let mut channel = connected();
        let mut logs = LogBook::with_capacity(8);

        coordinator
            .run(&mut channel, &mut logs, Endpoint::Reports, BTreeMap::new())
            .unwrap();
        logs.push(log_entry("progress"));

        let err = coordinator
            .run(&mut channel, &mut logs, second, BTreeMap::new())
            .unwrap_err();

        assert_eq!(
            err,
            InvocationError::AlreadyRunning {
                endpoint: Endpoint::Reports
            }
        );
        // The running request's logs survive a rejected attempt.
        assert_eq!(logs.len(), 1);
        assert!(channel.is_running_endpoint(&Endpoint::Reports));
    }

    #[test]
    fn run_requires_connection() {
        let mut coordinator = SingleFlightCoordinator::new();
        let mut channel = ChannelState::default();
        let mut logs = LogBook::with_capacity(8);

        let err = coordinator
            .run(&mut channel, &mut logs, Endpoint::Patients, BTreeMap::new())
            .unwrap_err();

        assert_eq!(err, InvocationError::NotConnected);
        assert_eq!(channel.activity, Activity::Idle);
    }

    #[test]
    fn stop_forces_idle_and_only_sends_when_connected() {
        let mut coordinator = SingleFlightCoordinator::new();
        let mut channel = connected();
        let mut logs = LogBook::with_capacity(8);
        coordinator
            .run(&mut channel, &mut logs, Endpoint::Reports, BTreeMap::new())
            .unwrap();

        let (stopped, command) = coordinator.stop(&mut channel);
        assert_eq!(stopped, Some(Endpoint::Reports));
        assert_eq!(command, Some(Command::StopAgent));
        assert_eq!(channel.activity, Activity::Idle);

        channel.is_connected = false;
        assert_eq!(coordinator.stop(&mut channel), (None, None));
    }

    #[test]
    fn release_leaves_non_running_activity_alone() {
        let mut coordinator = SingleFlightCoordinator::new();
        let mut channel = ChannelState {
            activity: Activity::Connecting,
            ..ChannelState::default()
        };

        assert_eq!(coordinator.complete(&mut channel), None);
        assert_eq!(channel.activity, Activity::Connecting);
    }

    #[test]
    fn disconnect_frees_channel() {
        let mut coordinator = SingleFlightCoordinator::new();
        let mut channel = connected();
        let mut logs = LogBook::with_capacity(8);
        coordinator
            .run(&mut channel, &mut logs, Endpoint::PatientChart, BTreeMap::new())
            .unwrap();

        assert_eq!(
            coordinator.disconnected(&mut channel),
            Some(Endpoint::PatientChart)
        );
        assert!(!channel.is_connected);
        assert!(!channel.is_running());
    }
}
