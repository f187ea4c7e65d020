use std::time::Duration;

use async_trait::async_trait;
use chairside_core::{BridgeConfig, InvocationState};
use eyre::{Result, bail, eyre};
use serde_json::{Value, json};
use std::io::Write;
use tracing::{debug, info};

use super::{Command, connect_bridge};
use crate::output::{pretty, render_data, render_logs};

/// Run one agent tool against the backend and print what it returns.
pub struct InvokeCommand {
    pub tool_name: String,
    pub arguments: Value,
    pub config: BridgeConfig,
    pub timeout: Duration,
    pub json: bool,
}

impl InvokeCommand {
    pub fn patients(query: Option<String>, config: BridgeConfig) -> Self {
        let arguments = match query {
            Some(query) => json!({ "query": query }),
            None => json!({}),
        };
        Self::new("get_patients", arguments, config)
    }

    pub fn report(patient_name: String, config: BridgeConfig) -> Self {
        Self::new(
            "get_reports",
            json!({ "patientName": patient_name }),
            config,
        )
    }

    pub fn chart(patient_name: String, config: BridgeConfig) -> Self {
        Self::new(
            "get_patient_chart",
            json!({ "patientName": patient_name }),
            config,
        )
    }

    fn new(tool_name: &str, arguments: Value, config: BridgeConfig) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            arguments,
            config,
            timeout: Duration::from_secs(120),
            json: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

#[async_trait]
impl Command for InvokeCommand {
    async fn execute(&self) -> Result<()> {
        let service = connect_bridge(&self.config).await?;
        let bridge = service.handle();

        let outcome = async {
            let receipt = bridge
                .invoke(self.tool_name.clone(), self.arguments.clone())
                .await
                .map_err(|e| eyre!("Tool call rejected: {}", e))?;
            info!(
                invocation_id = %receipt.invocation.id,
                tool_name = %self.tool_name,
                "Invocation registered"
            );
            debug!(descriptor = ?receipt.descriptor, "Provisional result");

            let state = bridge
                .wait_for_terminal(receipt.invocation.id, self.timeout)
                .await
                .map_err(|e| eyre!("No result for {}: {}", self.tool_name, e))?;
            let logs = bridge.logs().await.unwrap_or_default();
            Ok::<_, eyre::Report>((state, logs))
        }
        .await;

        service.shutdown().await;
        let (state, logs) = outcome?;

        let mut stdout = std::io::stdout();
        match state {
            InvocationState::Completed { data } => {
                if self.json {
                    writeln!(stdout, "{}", pretty(&data))?;
                } else {
                    if !logs.is_empty() {
                        writeln!(stdout, "{}\n", render_logs(&logs))?;
                    }
                    writeln!(stdout, "{}", render_data(&data))?;
                }
                Ok(())
            }
            InvocationState::Failed { error } => {
                if self.json {
                    writeln!(stdout, "{}", pretty(&error))?;
                }
                bail!("{} failed: {}", self.tool_name, error)
            }
            InvocationState::Pending | InvocationState::Running => {
                bail!("{} did not finish", self.tool_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patients_without_query_sends_empty_arguments() {
        let command = InvokeCommand::patients(None, BridgeConfig::default());
        assert_eq!(command.tool_name, "get_patients");
        assert_eq!(command.arguments, json!({}));
    }

    #[test]
    fn report_and_chart_use_camel_case_argument() {
        let report = InvokeCommand::report("Jane Smith".to_string(), BridgeConfig::default());
        let chart = InvokeCommand::chart("Jane Smith".to_string(), BridgeConfig::default())
            .with_timeout(Duration::from_secs(5))
            .with_json(true);

        assert_eq!(report.arguments, json!({ "patientName": "Jane Smith" }));
        assert_eq!(chart.tool_name, "get_patient_chart");
        assert_eq!(chart.timeout, Duration::from_secs(5));
        assert!(chart.json);
    }
}
