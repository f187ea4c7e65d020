use async_trait::async_trait;
use chairside_core::{BridgeConfig, BridgeEvent};
use eyre::{Result, eyre};
use std::io::Write;
use tracing::info;

use super::{Command, connect_bridge};
use crate::output::render_event;

/// Start the backend agent and print its progress until it completes.
/// Ctrl-C stops the agent.
pub struct AgentCommand {
    pub task: Option<String>,
    pub config: BridgeConfig,
    pub json: bool,
}

#[async_trait]
impl Command for AgentCommand {
    async fn execute(&self) -> Result<()> {
        let service = connect_bridge(&self.config).await?;
        let bridge = service.handle();
        let mut subscription = bridge.subscribe().await?;

        if let Err(e) = bridge.start_agent(self.task.clone()).await {
            service.shutdown().await;
            return Err(eyre!("Failed to start agent: {}", e));
        }
        info!(task = ?self.task, "Agent started");

        let mut stdout = std::io::stdout();
        loop {
            tokio::select! {
                envelope = subscription.recv() => {
                    let Some(envelope) = envelope else {
                        break;
                    };
                    if self.json {
                        writeln!(stdout, "{}", serde_json::to_string(&envelope)?)?;
                    } else if let Some(line) = render_event(&envelope.event) {
                        writeln!(stdout, "{line}")?;
                    }
                    if matches!(envelope.event, BridgeEvent::AgentComplete { .. }) {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping agent");
                    bridge.stop().await?;
                    break;
                }
            }
        }

        service.shutdown().await;
        Ok(())
    }
}
