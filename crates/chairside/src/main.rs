use std::time::Duration;

use clap::Parser;
use eyre::Result;

use chairside::cli::config::{load_env, resolve_config};
use chairside::cli::{Cli, Commands};
use chairside::commands::{
    Command, agent::AgentCommand, invoke::InvokeCommand, tools::ToolsCommand,
    watch::WatchCommand,
};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Load .env before parsing so it can supply CHAIRSIDE_WS_URL
    load_env()?;
    let cli = Cli::parse();

    chairside_core::utils::tracing::init_tracing()?;

    // Config is only resolved for commands that reach the backend, so `tools`
    // works without a URL.
    let bridge_config = || {
        let config = resolve_config(cli.url.as_deref(), cli.config.as_deref())?;
        debug!(ws_url = %config.ws_url, "Resolved bridge config");
        Ok::<_, eyre::Report>(config)
    };
    let timeout = Duration::from_secs(cli.timeout.max(1));

    match cli.command {
        Commands::Tools => ToolsCommand { json: cli.json }.execute().await,
        Commands::Patients { query } => {
            InvokeCommand::patients(query, bridge_config()?)
                .with_timeout(timeout)
                .with_json(cli.json)
                .execute()
                .await
        }
        Commands::Report { patient_name } => {
            InvokeCommand::report(patient_name, bridge_config()?)
                .with_timeout(timeout)
                .with_json(cli.json)
                .execute()
                .await
        }
        Commands::Chart { patient_name } => {
            InvokeCommand::chart(patient_name, bridge_config()?)
                .with_timeout(timeout)
                .with_json(cli.json)
                .execute()
                .await
        }
        Commands::Agent { task } => {
            AgentCommand {
                task,
                config: bridge_config()?,
                json: cli.json,
            }
            .execute()
            .await
        }
        Commands::Watch => {
            WatchCommand {
                config: bridge_config()?,
                json: cli.json,
            }
            .execute()
            .await
        }
    }
}
