use async_trait::async_trait;
use chairside_core::BridgeConfig;
use eyre::Result;
use std::io::Write;

use super::{Command, connect_bridge};
use crate::output::render_event;

pub struct WatchCommand {
    pub config: BridgeConfig,
    pub json: bool,
}

#[async_trait]
impl Command for WatchCommand {
    async fn execute(&self) -> Result<()> {
        let service = connect_bridge(&self.config).await?;
        let mut subscription = service.handle().subscribe().await?;

        let mut stdout = std::io::stdout();
        writeln!(stdout, "Connected to {}", self.config.ws_url)?;

        loop {
            tokio::select! {
                envelope = subscription.recv() => {
                    let Some(envelope) = envelope else {
                        break;
                    };
                    if self.json {
                        writeln!(stdout, "{}", serde_json::to_string(&envelope)?)?;
                    } else if let Some(line) = render_event(&envelope.event) {
                        writeln!(stdout, "{:>6} {line}", envelope.seq)?;
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        service.shutdown().await;
        Ok(())
    }
}
