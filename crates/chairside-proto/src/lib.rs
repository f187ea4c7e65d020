//! Wire vocabulary for the automation channel.
//!
//! Every frame is a JSON text message of the form `{ type, payload?, timestamp? }`.
//! Raw frames are parsed into an [`Envelope`] and then validated into typed
//! [`Command`]s (outbound) or [`InboundEvent`]s (inbound). Nothing past this
//! crate should need to dig through optional JSON fields.

pub mod data;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod inbound;
pub mod outbound;

pub use data::{
    ApiData, ChartData, Lenient, PatientChart, PatientRecord, PatientReport, PatientsData,
    Procedure, ProcedureSummary, ReportData,
};
pub use endpoint::Endpoint;
pub use envelope::{Envelope, MessageKind};
pub use error::ProtocolError;
pub use inbound::{
    AgentMessagePayload, AgentRole, ApiLogPayload, ApiOutcome, ApiResponse, BackendStatus,
    ErrorPayload, InboundEvent, ResponseStatus, ScreenshotPayload, StatusPayload,
};
pub use outbound::{Command, RunApiPayload, StartAgentPayload};
