use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, IntoStaticStr};

use crate::error::ProtocolError;

/// Every frame kind the channel knows about, in both directions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    // Outbound
    StartAgent,
    StopAgent,
    RunApi,

    // Inbound
    Screenshot,
    Status,
    Message,
    Error,
    AgentComplete,
    ApiLog,
    ApiResponse,
}

impl MessageKind {
    pub fn is_outbound(self) -> bool {
        matches!(
            self,
            MessageKind::StartAgent | MessageKind::StopAgent | MessageKind::RunApi
        )
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Untyped frame as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl Envelope {
    pub fn new(kind: MessageKind, payload: Option<Value>) -> Self {
        Self {
            kind,
            payload,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize the payload into `T`, failing if it is absent.
    pub(crate) fn decode_payload<T>(&self) -> Result<T, ProtocolError>
    where
        T: serde::de::DeserializeOwned,
    {
        let payload = self
            .payload
            .clone()
            .ok_or(ProtocolError::MissingPayload { kind: self.kind })?;
        serde_json::from_value(payload)
            .map_err(|e| ProtocolError::invalid_payload(self.kind, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn kind_names_match_wire_vocabulary() {
        let names: Vec<&str> = MessageKind::iter().map(MessageKind::as_str).collect();
        assert_eq!(
            names,
            vec![
                "start_agent",
                "stop_agent",
                "run_api",
                "screenshot",
                "status",
                "message",
                "error",
                "agent_complete",
                "api_log",
                "api_response",
            ]
        );
        for kind in MessageKind::iter() {
            let via_serde = serde_json::to_value(kind).unwrap();
            assert_eq!(via_serde, json!(kind.to_string()));
        }
    }

    #[test]
    fn parses_frame_without_payload_or_timestamp() {
        let envelope = Envelope::parse(r#"{"type":"agent_complete"}"#).unwrap();
        assert_eq!(envelope.kind, MessageKind::AgentComplete);
        assert!(envelope.payload.is_none());
        assert!(envelope.timestamp.is_none());
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = Envelope::parse(r#"{"type":"reboot"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn omits_empty_fields_when_serializing() {
        let json = Envelope::new(MessageKind::StopAgent, None).to_json().unwrap();
        assert_eq!(json, r#"{"type":"stop_agent"}"#);
    }
}
