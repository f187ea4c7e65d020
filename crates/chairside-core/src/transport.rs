use std::time::Duration;

use async_trait::async_trait;
use chairside_proto::{Command, InboundEvent, ProtocolError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Frames decoded by a transport, in arrival order. The sender side is
/// dropped when the underlying connection closes.
pub type InboundFrames = mpsc::Receiver<Result<InboundEvent, ProtocolError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Wire-level connection to the automation backend.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Open a fresh connection and return its inbound frame stream.
    async fn open(&mut self) -> Result<InboundFrames, TransportError>;

    async fn send(&mut self, command: &Command) -> Result<(), TransportError>;

    /// Close the current connection, if any. Idempotent.
    async fn close(&mut self);
}

#[derive(Debug)]
pub enum ChannelEvent {
    Connected,
    Disconnected { reason: String },
    Inbound(InboundEvent),
    /// A frame that failed validation. Never reaches the correlator.
    Rejected(ProtocolError),
}

/// One logical connection to the backend.
///
/// Reconnection is always caller initiated; the channel never retries on its
/// own. While no connection is open, [`TransportChannel::next_event`] never
/// resolves, so it can sit in a `select!` unconditionally.
pub struct TransportChannel {
    transport: Box<dyn Transport>,
    inbound: Option<InboundFrames>,
}

impl TransportChannel {
    pub fn new(transport: impl Transport) -> Self {
        Self {
            transport: Box::new(transport),
            inbound: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inbound.is_some()
    }

    pub async fn connect(&mut self, timeout: Duration) -> Result<ChannelEvent, TransportError> {
        if self.is_connected() {
            tracing::debug!("Transport already connected");
            return Ok(ChannelEvent::Connected);
        }

        let frames = match tokio::time::timeout(timeout, self.transport.open()).await {
            Ok(result) => result?,
            Err(_) => {
                self.transport.close().await;
                return Err(TransportError::ConnectTimeout(timeout));
            }
        };

        self.inbound = Some(frames);
        tracing::info!("Transport connected");
        Ok(ChannelEvent::Connected)
    }

    /// Close the connection. Returns `true` if a connection was open.
    pub async fn close(&mut self) -> bool {
        let was_connected = self.inbound.take().is_some();
        self.transport.close().await;
        if was_connected {
            tracing::info!("Transport closed");
        }
        was_connected
    }

    pub async fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        tracing::debug!(kind = %command.kind(), "Sending command");
        self.transport.send(command).await
    }

    /// Next event from the open connection. Cancel safe.
    pub async fn next_event(&mut self) -> ChannelEvent {
        let Some(frames) = self.inbound.as_mut() else {
            return std::future::pending().await;
        };

        match frames.recv().await {
            Some(Ok(event)) => {
                tracing::trace!(kind = %event.kind(), "Inbound event");
                ChannelEvent::Inbound(event)
            }
            Some(Err(error)) => {
                tracing::warn!(error = %error, "Dropping invalid inbound frame");
                ChannelEvent::Rejected(error)
            }
            None => {
                self.inbound = None;
                tracing::warn!("Transport stream ended");
                ChannelEvent::Disconnected {
                    reason: "connection closed by peer".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::in_memory_transport;
    use chairside_proto::{BackendStatus, Endpoint};
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn send_without_connection_fails_not_connected() {
        let (transport, backend) = in_memory_transport();
        let mut channel = TransportChannel::new(transport);

        let result = channel
            .send(&Command::run_api(Endpoint::Patients, Default::default()))
            .await;

        assert!(matches!(result, Err(TransportError::NotConnected)));
        assert!(backend.sent().await.is_empty());
    }

    #[tokio::test]
    async fn connected_channel_delivers_events_in_order() {
        let (transport, backend) = in_memory_transport();
        let mut channel = TransportChannel::new(transport);

        assert!(matches!(
            channel.connect(TIMEOUT).await,
            Ok(ChannelEvent::Connected)
        ));
        assert!(channel.is_connected());

        backend.status(BackendStatus::Running, "working").await;
        backend.log("first").await;

        assert!(matches!(
            channel.next_event().await,
            ChannelEvent::Inbound(InboundEvent::Status(_))
        ));
        match channel.next_event().await {
            ChannelEvent::Inbound(InboundEvent::Log(log)) => assert_eq!(log.message, "first"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_frames_are_rejected_not_delivered() {
        let (transport, backend) = in_memory_transport();
        let mut channel = TransportChannel::new(transport);
        channel.connect(TIMEOUT).await.unwrap();

        backend.push_raw("not json").await;
        backend
            .push_raw(&json!({ "type": "api_log" }).to_string())
            .await;

        assert!(matches!(
            channel.next_event().await,
            ChannelEvent::Rejected(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            channel.next_event().await,
            ChannelEvent::Rejected(ProtocolError::MissingPayload { .. })
        ));
    }

    #[tokio::test]
    async fn dropped_connection_surfaces_as_disconnect() {
        let (transport, backend) = in_memory_transport();
        let mut channel = TransportChannel::new(transport);
        channel.connect(TIMEOUT).await.unwrap();

        backend.drop_connection().await;

        assert!(matches!(
            channel.next_event().await,
            ChannelEvent::Disconnected { .. }
        ));
        assert!(!channel.is_connected());

        // Caller initiated reconnect opens a fresh stream.
        channel.connect(TIMEOUT).await.unwrap();
        assert!(channel.is_connected());
        assert_eq!(backend.connect_count().await, 2);
    }

    #[tokio::test]
    async fn refused_connect_reports_failure() {
        let (transport, backend) = in_memory_transport();
        backend.set_refuse_connect(true).await;
        let mut channel = TransportChannel::new(transport);

        let result = channel.connect(TIMEOUT).await;

        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
        assert!(!channel.is_connected());
    }
}
