use std::collections::BTreeMap;
use std::fmt;

use chairside_proto::{ApiData, Endpoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::InvocationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for InvocationId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The single backend call an invocation maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCall {
    pub endpoint: Endpoint,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl EndpointCall {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One agent tool call. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub id: InvocationId,
    pub tool_name: String,
    pub arguments: Value,
    pub call: EndpointCall,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InvocationState {
    Pending,
    Running,
    Completed { data: ApiData },
    Failed { error: InvocationError },
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvocationState::Completed { .. } | InvocationState::Failed { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            InvocationState::Pending => "pending",
            InvocationState::Running => "running",
            InvocationState::Completed { .. } => "completed",
            InvocationState::Failed { .. } => "failed",
        }
    }

    /// Derive the state from the latest correlation record. This is the only
    /// way a state is produced; nothing stores an `InvocationState` directly.
    pub(crate) fn derive(record: Option<&Correlation>) -> Self {
        match record {
            None => InvocationState::Pending,
            Some(Correlation::Dispatched) => InvocationState::Running,
            Some(Correlation::Resolved(Ok(data))) => InvocationState::Completed { data: data.clone() },
            Some(Correlation::Resolved(Err(error))) => InvocationState::Failed {
                error: error.clone(),
            },
        }
    }
}

/// Latest correlated fact about an invocation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Correlation {
    Dispatched,
    Resolved(Result<ApiData, InvocationError>),
}

impl Correlation {
    pub(crate) fn is_resolved(&self) -> bool {
        matches!(self, Correlation::Resolved(_))
    }
}
