use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use super::event::BridgeEvent;

#[derive(Debug, Clone, Serialize)]
pub struct BridgeEventEnvelope {
    pub seq: u64,
    pub event: BridgeEvent,
}

pub struct BridgeEventSubscription {
    pub rx: broadcast::Receiver<BridgeEventEnvelope>,
    unsubscribe_tx: mpsc::UnboundedSender<UnsubscribeSignal>,
}

pub(crate) struct UnsubscribeSignal;

impl BridgeEventSubscription {
    pub(crate) fn new(
        rx: broadcast::Receiver<BridgeEventEnvelope>,
        unsubscribe_tx: mpsc::UnboundedSender<UnsubscribeSignal>,
    ) -> Self {
        Self { rx, unsubscribe_tx }
    }

    pub async fn recv(&mut self) -> Option<BridgeEventEnvelope> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        lagged = n,
                        "Event subscriber lagged, some events were dropped"
                    );
                }
            }
        }
    }
}

impl Drop for BridgeEventSubscription {
    fn drop(&mut self) {
        let _ = self.unsubscribe_tx.send(UnsubscribeSignal);
    }
}
