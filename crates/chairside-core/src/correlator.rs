use chairside_proto::{ApiData, ApiLogPayload, ApiOutcome, ApiResponse, Endpoint};

use crate::error::InvocationError;
use crate::invocation::InvocationId;
use crate::state::{ChannelState, LogBook, LogEntry};

#[derive(Debug, Clone, PartialEq)]
struct Binding {
    endpoint: Endpoint,
    invocation: Option<InvocationId>,
}

/// Result of correlating one `api_response`.
#[derive(Debug, Clone, PartialEq)]
pub enum Correlated {
    /// The response belongs to the running endpoint. `invocation` is `None`
    /// for runs that were started directly rather than by a tool call.
    Matched {
        endpoint: Endpoint,
        invocation: Option<InvocationId>,
        outcome: Result<ApiData, InvocationError>,
    },
    /// Nothing is running for this endpoint; the response is dropped.
    Stale {
        endpoint: Endpoint,
        running: Option<Endpoint>,
    },
}

/// Attaches inbound responses to the invocation bound to the running
/// endpoint.
///
/// Matching is by endpoint only because the backend does not echo request
/// ids. Single-flight makes that sufficient: at most one endpoint runs, and a
/// response for anything else is stale.
#[derive(Debug, Default)]
pub struct ResponseCorrelator {
    bound: Option<Binding>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, endpoint: Endpoint, invocation: Option<InvocationId>) {
        if let Some(previous) = self.bound.replace(Binding {
            endpoint,
            invocation,
        }) {
            tracing::warn!(
                endpoint = %previous.endpoint,
                "Replacing binding that was never released"
            );
        }
    }

    pub fn bound_invocation(&self) -> Option<InvocationId> {
        self.bound.as_ref().and_then(|binding| binding.invocation)
    }

    /// Drop the binding without resolving anything, e.g. after a failed send.
    pub fn unbind(&mut self) -> Option<InvocationId> {
        self.bound.take().and_then(|binding| binding.invocation)
    }

    /// Must be called before the coordinator releases the channel, since
    /// matching reads the running endpoint from `channel`.
    pub fn on_response(&mut self, channel: &ChannelState, response: ApiResponse) -> Correlated {
        let ApiResponse { endpoint, outcome } = response;

        if !channel.is_running_endpoint(&endpoint) {
            let running = channel.running_endpoint().cloned();
            tracing::debug!(
                endpoint = %endpoint,
                running = ?running,
                "Discarding stale response"
            );
            return Correlated::Stale { endpoint, running };
        }

        let invocation = match self.bound.take() {
            Some(binding) if binding.endpoint == endpoint => binding.invocation,
            Some(binding) => {
                tracing::warn!(
                    bound = %binding.endpoint,
                    endpoint = %endpoint,
                    "Running endpoint does not match binding"
                );
                None
            }
            None => None,
        };

        let outcome = match outcome {
            ApiOutcome::Success { data } => Ok(data),
            ApiOutcome::Error { message } => Err(InvocationError::Backend { message }),
        };

        tracing::debug!(
            endpoint = %endpoint,
            invocation_id = ?invocation,
            success = outcome.is_ok(),
            "Correlated response"
        );

        Correlated::Matched {
            endpoint,
            invocation,
            outcome,
        }
    }

    /// The connection dropped; whatever was bound can never complete.
    pub fn on_disconnect(&mut self) -> Option<(InvocationId, InvocationError)> {
        self.unbind()
            .map(|invocation| (invocation, InvocationError::ConnectionLost))
    }

    pub fn on_stop(&mut self) -> Option<(InvocationId, InvocationError)> {
        self.unbind()
            .map(|invocation| (invocation, InvocationError::Cancelled))
    }

    /// Append a progress line, tagged with the endpoint running at arrival.
    pub fn on_log(
        &self,
        channel: &ChannelState,
        logs: &mut LogBook,
        payload: ApiLogPayload,
    ) -> LogEntry {
        let entry = LogEntry::from_payload(payload, channel.running_endpoint().cloned());
        logs.push(entry.clone());
        entry
    }
}
