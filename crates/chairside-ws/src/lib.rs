//! WebSocket implementation of [`chairside_core::Transport`].
//!
//! Each text frame carries one JSON envelope. Frames are decoded on a
//! dedicated reader task and handed to the bridge in arrival order.

use async_trait::async_trait;
use chairside_core::transport::InboundFrames;
use chairside_core::{Transport, TransportError};
use chairside_proto::{Command, InboundEvent, ProtocolError};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const INBOUND_BUFFER: usize = 64;

struct Connection {
    sink: SplitSink<Socket, Message>,
    reader: JoinHandle<()>,
}

pub struct WsTransport {
    url: String,
    connection: Option<Connection>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn read_frames(
        mut stream: SplitStream<Socket>,
        frames_tx: mpsc::Sender<Result<InboundEvent, ProtocolError>>,
    ) {
        debug!("Started inbound frame reader");

        while let Some(result) = stream.next().await {
            let text = match result {
                Ok(Message::Text(text)) => text.as_str().to_owned(),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping non UTF-8 binary frame: {}", e);
                        continue;
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Received close frame");
                    break;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(e) => {
                    warn!("WebSocket read error: {}", e);
                    break;
                }
            };

            if frames_tx.send(InboundEvent::parse(&text)).await.is_err() {
                debug!("Frame receiver dropped");
                break;
            }
        }

        debug!("Inbound frame reader ended");
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&mut self) -> Result<InboundFrames, TransportError> {
        // A connection the peer already dropped may still be held here.
        self.close().await;

        info!("Connecting to {}", self.url);
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let (sink, stream) = socket.split();
        let (frames_tx, frames_rx) = mpsc::channel(INBOUND_BUFFER);
        let reader = tokio::spawn(Self::read_frames(stream, frames_tx));

        self.connection = Some(Connection { sink, reader });
        Ok(frames_rx)
    }

    async fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(TransportError::NotConnected)?;
        let text = command.to_json()?;

        connection
            .sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        if let Err(e) = connection.sink.send(Message::Close(None)).await {
            debug!("Close frame not delivered: {}", e);
        }
        let _ = connection.sink.close().await;
        connection.reader.abort();
        debug!("Closed connection to {}", self.url);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.reader.abort();
        }
    }
}
