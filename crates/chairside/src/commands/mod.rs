use async_trait::async_trait;
use chairside_core::{BridgeConfig, BridgeService, ToolInvocationRegistry};
use chairside_ws::WsTransport;
use eyre::{Result, eyre};

pub mod agent;
pub mod invoke;
pub mod tools;
pub mod watch;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Spawn a bridge over WebSocket and connect it.
async fn connect_bridge(config: &BridgeConfig) -> Result<BridgeService> {
    let service = BridgeService::spawn(
        config,
        ToolInvocationRegistry::with_builtin_tools(),
        WsTransport::new(config.ws_url.clone()),
    );

    if let Err(e) = service.handle().connect().await {
        service.shutdown().await;
        return Err(eyre!(
            "Failed to connect to backend at {}: {}",
            config.ws_url,
            e
        ));
    }

    Ok(service)
}
