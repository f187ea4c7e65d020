use thiserror::Error;

use crate::envelope::MessageKind;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Missing payload for {kind} frame")]
    MissingPayload { kind: MessageKind },

    #[error("Invalid payload for {kind} frame: {reason}")]
    InvalidPayload { kind: MessageKind, reason: String },

    #[error("{kind} is an outbound command and cannot arrive from the backend")]
    UnexpectedDirection { kind: MessageKind },
}

impl ProtocolError {
    pub fn invalid_payload(kind: MessageKind, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidPayload {
            kind,
            reason: reason.into(),
        }
    }
}
