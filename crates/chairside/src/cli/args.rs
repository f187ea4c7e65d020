use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chairside_core::config::WS_URL_ENV;

/// Drive the dental practice automation backend from the terminal.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// WebSocket URL of the automation backend (overrides the config file)
    #[arg(long, env = WS_URL_ENV, global = true)]
    pub url: Option<String>,

    /// Path to a config file (TOML) instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Seconds to wait for the backend to answer a request
    #[arg(long, default_value = "120", global = true)]
    pub timeout: u64,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// List the agent tools and their input schemas
    Tools,
    /// Fetch the patient list
    Patients {
        /// Filter patients by name
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Fetch a patient's report
    Report {
        /// Full patient name, e.g. "Jane Smith"
        patient_name: String,
    },
    /// Fetch a patient's chart
    Chart {
        /// Full patient name, e.g. "Jane Smith"
        patient_name: String,
    },
    /// Start the backend agent and follow its progress
    Agent {
        /// Task for the agent to carry out
        #[arg(long)]
        task: Option<String>,
    },
    /// Stream bridge events until interrupted
    Watch,
}

impl Commands {
    /// Whether the command talks to the backend and so needs a resolved config.
    pub fn needs_bridge(&self) -> bool {
        !matches!(self, Commands::Tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_report_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "chairside",
            "report",
            "Jane Smith",
            "--url",
            "ws://127.0.0.1:9000/ws",
            "--json",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Commands::Report {
                patient_name: "Jane Smith".to_string()
            }
        );
        assert_eq!(cli.url.as_deref(), Some("ws://127.0.0.1:9000/ws"));
        assert!(cli.json);
        assert_eq!(cli.timeout, 120);
    }

    #[test]
    fn patients_query_is_optional() {
        let cli = Cli::try_parse_from(["chairside", "patients"]).unwrap();
        assert_eq!(cli.command, Commands::Patients { query: None });

        let cli = Cli::try_parse_from(["chairside", "patients", "-q", "smith"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Patients {
                query: Some("smith".to_string())
            }
        );
    }

    #[test]
    fn chart_requires_patient_name() {
        assert!(Cli::try_parse_from(["chairside", "chart"]).is_err());
    }

    #[test]
    fn only_tools_runs_without_a_backend() {
        let tools = Cli::try_parse_from(["chairside", "tools"]).unwrap();
        assert!(!tools.command.needs_bridge());

        for args in [
            vec!["chairside", "patients"],
            vec!["chairside", "report", "Jane Smith"],
            vec!["chairside", "chart", "Jane Smith"],
            vec!["chairside", "agent"],
            vec!["chairside", "watch"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert!(cli.command.needs_bridge(), "{:?}", cli.command);
        }
    }
}
