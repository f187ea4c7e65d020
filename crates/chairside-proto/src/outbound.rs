use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::envelope::{Envelope, MessageKind};
use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunApiPayload {
    pub endpoint: Endpoint,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAgentPayload {
    pub task: String,
}

/// Commands sent to the automation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartAgent { task: Option<String> },
    StopAgent,
    RunApi(RunApiPayload),
}

impl Command {
    pub fn run_api(endpoint: Endpoint, params: BTreeMap<String, String>) -> Self {
        Command::RunApi(RunApiPayload { endpoint, params })
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Command::StartAgent { .. } => MessageKind::StartAgent,
            Command::StopAgent => MessageKind::StopAgent,
            Command::RunApi(_) => MessageKind::RunApi,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let payload = match self {
            Command::StartAgent { task: Some(task) } => Some(serde_json::to_value(
                StartAgentPayload { task: task.clone() },
            )?),
            Command::StartAgent { task: None } | Command::StopAgent => None,
            Command::RunApi(payload) => Some(serde_json::to_value(payload)?),
        };
        Ok(Envelope::new(self.kind(), payload))
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        self.to_envelope()?.to_json()
    }

    /// Parse a command frame. Used by backends and test doubles that sit on
    /// the receiving end of the channel.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind {
            MessageKind::StartAgent => {
                let task = match &envelope.payload {
                    None => None,
                    Some(_) => Some(envelope.decode_payload::<StartAgentPayload>()?.task),
                };
                Ok(Command::StartAgent { task })
            }
            MessageKind::StopAgent => Ok(Command::StopAgent),
            MessageKind::RunApi => Ok(Command::RunApi(envelope.decode_payload()?)),
            kind => Err(ProtocolError::invalid_payload(
                kind,
                "not an outbound command",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_api_frame_matches_wire_shape() {
        let mut params = BTreeMap::new();
        params.insert("patient_name".to_string(), "Jane Smith".to_string());
        let command = Command::run_api(Endpoint::Reports, params);

        let value: serde_json::Value = serde_json::from_str(&command.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "run_api",
                "payload": { "endpoint": "reports", "params": { "patient_name": "Jane Smith" } }
            })
        );
    }

    #[test]
    fn run_api_without_params_omits_them() {
        let command = Command::run_api(Endpoint::Patients, BTreeMap::new());
        assert_eq!(
            command.to_json().unwrap(),
            r#"{"type":"run_api","payload":{"endpoint":"patients"}}"#
        );
    }

    #[test]
    fn start_agent_task_is_optional() {
        assert_eq!(
            Command::StartAgent { task: None }.to_json().unwrap(),
            r#"{"type":"start_agent"}"#
        );
        let with_task = Command::StartAgent {
            task: Some("open the schedule".to_string()),
        };
        let envelope = with_task.to_envelope().unwrap();
        assert_eq!(Command::from_envelope(&envelope).unwrap(), with_task);
    }

    #[test]
    fn inbound_kind_is_not_a_command() {
        let envelope = Envelope::new(MessageKind::ApiLog, None);
        assert!(Command::from_envelope(&envelope).is_err());
    }
}
