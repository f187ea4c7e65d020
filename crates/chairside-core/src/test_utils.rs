//! In-memory transport and a scripted backend for driving the bridge in tests.

use std::sync::Arc;

use async_trait::async_trait;
use chairside_proto::{BackendStatus, Command, Endpoint, InboundEvent, ProtocolError};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};

use crate::transport::{InboundFrames, Transport, TransportError};

const FRAME_BUFFER: usize = 64;

#[derive(Default)]
struct Shared {
    inbound_tx: Option<mpsc::Sender<Result<InboundEvent, ProtocolError>>>,
    sent: Vec<Command>,
    refuse_connect: bool,
    fail_sends: bool,
    connect_count: usize,
}

pub struct InMemoryTransport {
    shared: Arc<Mutex<Shared>>,
}

/// The backend side of an [`InMemoryTransport`].
#[derive(Clone)]
pub struct FakeBackend {
    shared: Arc<Mutex<Shared>>,
}

pub fn in_memory_transport() -> (InMemoryTransport, FakeBackend) {
    let shared = Arc::new(Mutex::new(Shared::default()));
    (
        InMemoryTransport {
            shared: shared.clone(),
        },
        FakeBackend { shared },
    )
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn open(&mut self) -> Result<InboundFrames, TransportError> {
        let mut shared = self.shared.lock().await;
        if shared.refuse_connect {
            return Err(TransportError::ConnectFailed("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        shared.inbound_tx = Some(tx);
        shared.connect_count += 1;
        Ok(rx)
    }

    async fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        let mut shared = self.shared.lock().await;
        if shared.inbound_tx.is_none() {
            return Err(TransportError::SendFailed("connection closed".to_string()));
        }
        if shared.fail_sends {
            return Err(TransportError::SendFailed("write rejected".to_string()));
        }
        shared.sent.push(command.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.lock().await.inbound_tx = None;
    }
}

impl FakeBackend {
    /// Deliver an already validated event.
    pub async fn push(&self, event: InboundEvent) {
        self.deliver(Ok(event)).await;
    }

    /// Deliver a raw text frame, validated the way a real transport would.
    pub async fn push_raw(&self, text: &str) {
        self.deliver(InboundEvent::parse(text)).await;
    }

    pub async fn push_frame(&self, kind: &str, payload: Value) {
        self.push_raw(&json!({ "type": kind, "payload": payload }).to_string())
            .await;
    }

    pub async fn respond(&self, endpoint: Endpoint, data: Value) {
        self.push_frame(
            "api_response",
            json!({ "endpoint": endpoint, "status": "success", "data": data }),
        )
        .await;
    }

    pub async fn fail(&self, endpoint: Endpoint, message: &str) {
        self.push_frame(
            "api_response",
            json!({ "endpoint": endpoint, "status": "error", "error": message }),
        )
        .await;
    }

    pub async fn log(&self, message: &str) {
        self.push_frame(
            "api_log",
            json!({ "message": message, "timestamp": 0.0, "level": "info" }),
        )
        .await;
    }

    pub async fn status(&self, status: BackendStatus, message: &str) {
        self.push_frame("status", json!({ "status": status, "message": message }))
            .await;
    }

    /// Close the connection from the backend side.
    pub async fn drop_connection(&self) {
        self.shared.lock().await.inbound_tx = None;
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.lock().await.inbound_tx.is_some()
    }

    pub async fn sent(&self) -> Vec<Command> {
        self.shared.lock().await.sent.clone()
    }

    pub async fn run_api_count(&self) -> usize {
        self.shared
            .lock()
            .await
            .sent
            .iter()
            .filter(|command| matches!(command, Command::RunApi(_)))
            .count()
    }

    pub async fn connect_count(&self) -> usize {
        self.shared.lock().await.connect_count
    }

    pub async fn set_refuse_connect(&self, refuse: bool) {
        self.shared.lock().await.refuse_connect = refuse;
    }

    pub async fn set_fail_sends(&self, fail: bool) {
        self.shared.lock().await.fail_sends = fail;
    }

    async fn deliver(&self, frame: Result<InboundEvent, ProtocolError>) {
        let tx = self.shared.lock().await.inbound_tx.clone();
        match tx {
            Some(tx) => {
                if tx.send(frame).await.is_err() {
                    tracing::debug!("Fake backend frame dropped, receiver gone");
                }
            }
            None => tracing::debug!("Fake backend frame dropped, not connected"),
        }
    }
}
