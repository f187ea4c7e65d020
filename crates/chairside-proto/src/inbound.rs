use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::ApiData;
use crate::endpoint::Endpoint;
use crate::envelope::{Envelope, MessageKind};
use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    Connecting,
    Running,
    Idle,
    Error,
    Completed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: BackendStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLogPayload {
    pub message: String,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotPayload {
    pub image_data: String,
    #[serde(default)]
    pub step: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Assistant,
    System,
    Reasoning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessagePayload {
    pub role: AgentRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// `api_response` payload exactly as the backend sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RawApiResponse {
    endpoint: Endpoint,
    status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApiOutcome {
    Success { data: ApiData },
    Error { message: String },
}

/// A validated `api_response`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub endpoint: Endpoint,
    #[serde(flatten)]
    pub outcome: ApiOutcome,
}

const DEFAULT_BACKEND_ERROR: &str = "Backend reported an error without a message";

impl ApiResponse {
    pub fn success(endpoint: Endpoint, data: ApiData) -> Self {
        Self {
            endpoint,
            outcome: ApiOutcome::Success { data },
        }
    }

    pub fn error(endpoint: Endpoint, message: impl Into<String>) -> Self {
        Self {
            endpoint,
            outcome: ApiOutcome::Error {
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ApiOutcome::Success { .. })
    }

    /// A success whose data does not fit the endpoint's shape becomes an
    /// error outcome for that endpoint.
    fn from_raw(raw: RawApiResponse) -> Self {
        match raw.status {
            ResponseStatus::Error => Self::error(
                raw.endpoint,
                raw.error.unwrap_or_else(|| DEFAULT_BACKEND_ERROR.to_string()),
            ),
            ResponseStatus::Success => {
                let data = raw.data.unwrap_or_else(|| Value::Object(Default::default()));
                match ApiData::for_endpoint(&raw.endpoint, data) {
                    Ok(data) => Self::success(raw.endpoint, data),
                    Err(e) => {
                        let message = format!("Malformed {} data: {e}", raw.endpoint);
                        Self::error(raw.endpoint, message)
                    }
                }
            }
        }
    }
}

/// Events that can arrive from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Status(StatusPayload),
    Log(ApiLogPayload),
    Response(ApiResponse),
    Screenshot(ScreenshotPayload),
    Message(AgentMessagePayload),
    AgentComplete(Option<Value>),
    Error(ErrorPayload),
}

impl InboundEvent {
    pub fn kind(&self) -> MessageKind {
        match self {
            InboundEvent::Status(_) => MessageKind::Status,
            InboundEvent::Log(_) => MessageKind::ApiLog,
            InboundEvent::Response(_) => MessageKind::ApiResponse,
            InboundEvent::Screenshot(_) => MessageKind::Screenshot,
            InboundEvent::Message(_) => MessageKind::Message,
            InboundEvent::AgentComplete(_) => MessageKind::AgentComplete,
            InboundEvent::Error(_) => MessageKind::Error,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(Envelope::parse(text)?)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind {
            MessageKind::Status => Ok(InboundEvent::Status(envelope.decode_payload()?)),
            MessageKind::ApiLog => Ok(InboundEvent::Log(envelope.decode_payload()?)),
            MessageKind::ApiResponse => Ok(InboundEvent::Response(ApiResponse::from_raw(
                envelope.decode_payload()?,
            ))),
            MessageKind::Screenshot => Ok(InboundEvent::Screenshot(envelope.decode_payload()?)),
            MessageKind::Message => Ok(InboundEvent::Message(envelope.decode_payload()?)),
            MessageKind::AgentComplete => Ok(InboundEvent::AgentComplete(envelope.payload)),
            MessageKind::Error => Ok(InboundEvent::Error(error_payload(&envelope)?)),
            kind @ (MessageKind::StartAgent | MessageKind::StopAgent | MessageKind::RunApi) => {
                Err(ProtocolError::UnexpectedDirection { kind })
            }
        }
    }
}

impl TryFrom<Envelope> for InboundEvent {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, ProtocolError> {
        Self::from_envelope(envelope)
    }
}

/// Backends send errors either as `{ message }`, `{ error }` or a bare string.
fn error_payload(envelope: &Envelope) -> Result<ErrorPayload, ProtocolError> {
    let payload = envelope
        .payload
        .as_ref()
        .ok_or(ProtocolError::MissingPayload {
            kind: envelope.kind,
        })?;

    let message = match payload {
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => fields
            .get("message")
            .or_else(|| fields.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };

    message
        .map(|message| ErrorPayload { message })
        .ok_or_else(|| ProtocolError::invalid_payload(envelope.kind, "no error message"))
}
