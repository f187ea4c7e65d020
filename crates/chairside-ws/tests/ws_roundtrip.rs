use std::time::Duration;

use chairside_core::{
    BridgeConfig, BridgeService, InvocationState, ToolInvocationRegistry, Transport,
    TransportError,
};
use chairside_proto::{Command, Endpoint, InboundEvent};
use chairside_ws::WsTransport;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

/// A one-connection backend. Every text frame the client sends is forwarded
/// on the returned channel; each one is answered with the frames produced by
/// `reply`.
async fn scripted_backend(
    reply: impl Fn(&Value) -> Vec<Value> + Send + 'static,
) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

        while let Some(Ok(message)) = socket.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            for answer in reply(&frame) {
                socket
                    .send(Message::Text(answer.to_string().into()))
                    .await
                    .unwrap();
            }
            let _ = seen_tx.send(frame);
        }
    });

    (url, seen_rx)
}

fn patients_reply(frame: &Value) -> Vec<Value> {
    if frame["type"] != "run_api" {
        return Vec::new();
    }
    vec![
        json!({
            "type": "api_log",
            "payload": { "message": "Opening patient list", "timestamp": 1.0, "level": "info" }
        }),
        json!({
            "type": "api_response",
            "payload": {
                "endpoint": "patients",
                "status": "success",
                "data": { "patients": [{ "first_name": "Jane", "last_name": "Smith" }] }
            }
        }),
    ]
}

#[tokio::test]
async fn commands_go_out_as_text_envelopes() {
    let (url, mut seen) = scripted_backend(|_| Vec::new()).await;
    let mut transport = WsTransport::new(url);
    let _frames = transport.open().await.unwrap();

    transport
        .send(&Command::run_api(Endpoint::Patients, Default::default()))
        .await
        .unwrap();

    let frame = tokio::time::timeout(TIMEOUT, seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        frame,
        json!({ "type": "run_api", "payload": { "endpoint": "patients" } })
    );
}

#[tokio::test]
async fn inbound_frames_are_decoded_in_order() {
    let (url, _seen) = scripted_backend(patients_reply).await;
    let mut transport = WsTransport::new(url);
    let mut frames = transport.open().await.unwrap();

    transport
        .send(&Command::run_api(Endpoint::Patients, Default::default()))
        .await
        .unwrap();

    let first = tokio::time::timeout(TIMEOUT, frames.recv()).await.unwrap();
    assert!(matches!(first, Some(Ok(InboundEvent::Log(_)))));

    let second = tokio::time::timeout(TIMEOUT, frames.recv()).await.unwrap();
    match second {
        Some(Ok(InboundEvent::Response(response))) => {
            assert_eq!(response.endpoint, Endpoint::Patients);
            assert!(response.is_success());
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_text_surfaces_as_protocol_error() {
    let (url, _seen) = scripted_backend(|_| vec![json!({ "type": "api_log" })]).await;
    let mut transport = WsTransport::new(url);
    let mut frames = transport.open().await.unwrap();

    transport.send(&Command::StopAgent).await.unwrap();

    let frame = tokio::time::timeout(TIMEOUT, frames.recv()).await.unwrap();
    assert!(matches!(frame, Some(Err(_))));
}

#[tokio::test]
async fn send_before_open_is_not_connected() {
    let mut transport = WsTransport::new("ws://127.0.0.1:9");

    let result = transport.send(&Command::StopAgent).await;

    assert!(matches!(result, Err(TransportError::NotConnected)));
}

#[tokio::test]
async fn refused_connection_reports_connect_failed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut transport = WsTransport::new(url);
    let result = transport.open().await;

    assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
}

#[tokio::test]
async fn closing_ends_the_inbound_stream() {
    let (url, _seen) = scripted_backend(|_| Vec::new()).await;
    let mut transport = WsTransport::new(url);
    let mut frames = transport.open().await.unwrap();

    transport.close().await;

    let end = tokio::time::timeout(TIMEOUT, frames.recv()).await.unwrap();
    assert!(end.is_none());
    assert!(matches!(
        transport.send(&Command::StopAgent).await,
        Err(TransportError::NotConnected)
    ));
}

#[tokio::test]
async fn tool_call_completes_over_websocket() {
    let (url, _seen) = scripted_backend(patients_reply).await;
    let config = BridgeConfig::default().with_ws_url(url.clone());
    let service = BridgeService::spawn(
        &config,
        ToolInvocationRegistry::with_builtin_tools(),
        WsTransport::new(url),
    );
    let bridge = service.handle();

    bridge.connect().await.unwrap();
    let receipt = bridge.invoke("get_patients", json!({})).await.unwrap();
    let state = bridge
        .wait_for_terminal(receipt.invocation.id, TIMEOUT)
        .await
        .unwrap();

    match state {
        InvocationState::Completed { data } => {
            let patients = data.as_patients().unwrap();
            assert_eq!(patients.patients[0].display_name(), "Jane Smith");
        }
        other => panic!("unexpected state: {other:?}"),
    }

    let logs = bridge.logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "Opening patient list");

    service.shutdown().await;
}
