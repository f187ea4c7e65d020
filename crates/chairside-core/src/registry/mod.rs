//! Agent-facing tool contract.
//!
//! A tool call returns a provisional [`PendingDescriptor`] immediately; the
//! data arrives later through correlation and is read back as an
//! [`InvocationState`].

mod builtin;

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use chairside_proto::ApiData;

use crate::error::{BridgeError, InvocationError};
use crate::invocation::{Correlation, EndpointCall, InvocationId, InvocationState, ToolInvocation};

pub use builtin::{
    GET_PATIENT_CHART_TOOL_NAME, GET_PATIENTS_TOOL_NAME, GET_REPORTS_TOOL_NAME, GetPatientChart,
    GetPatientChartArgs, GetPatients, GetPatientsArgs, GetReports, GetReportsArgs,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Provisional result handed back to the agent before the backend runs.
/// Serializes as `{ action, status: "pending", ...arguments }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDescriptor {
    pub action: String,
    pub status: String,
    #[serde(flatten)]
    pub arguments: Map<String, Value>,
}

/// A binding resolved against concrete arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub call: EndpointCall,
    /// Normalised arguments echoed in the pending descriptor.
    pub echo: Map<String, Value>,
}

/// Typed tool whose execution is a single backend endpoint call.
pub trait EndpointTool: Send + Sync + 'static {
    type Params: DeserializeOwned + Serialize + JsonSchema + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    /// Map validated arguments onto the endpoint call. An `Err` carries a
    /// human readable reason and is reported as `InvalidArguments`.
    fn endpoint_call(&self, params: &Self::Params) -> Result<EndpointCall, String>;

    fn schema() -> ToolSchema
    where
        Self: Sized,
    {
        let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
        });
        let schema_gen = settings.into_generator();
        let input_schema = schema_gen.into_root_schema_for::<Self::Params>();

        ToolSchema {
            name: Self::NAME.to_string(),
            description: Self::DESCRIPTION.to_string(),
            input_schema: serde_json::to_value(&input_schema).unwrap_or(Value::Null),
        }
    }
}

/// Object-safe view of a tool binding, stored by the registry.
pub trait ToolBinding: Send + Sync {
    fn tool_schema(&self, name: &str) -> ToolSchema;

    fn plan(&self, name: &str, arguments: &Value) -> Result<PlannedCall, BridgeError>;
}

impl<T> ToolBinding for T
where
    T: EndpointTool,
{
    fn tool_schema(&self, _name: &str) -> ToolSchema {
        T::schema()
    }

    fn plan(&self, name: &str, arguments: &Value) -> Result<PlannedCall, BridgeError> {
        let params: T::Params = serde_json::from_value(normalize_arguments(arguments))
            .map_err(|e| BridgeError::invalid_arguments(name, e.to_string()))?;
        let call = self
            .endpoint_call(&params)
            .map_err(|reason| BridgeError::invalid_arguments(name, reason))?;
        let echo = match serde_json::to_value(&params) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => Map::new(),
            Err(e) => return Err(BridgeError::invalid_arguments(name, e.to_string())),
        };
        Ok(PlannedCall { call, echo })
    }
}

type PlanFn = dyn Fn(&Value) -> Result<EndpointCall, String> + Send + Sync;

/// Binding built from a closure. Arguments are echoed as given.
pub struct FnBinding {
    description: String,
    input_schema: Value,
    plan: Box<PlanFn>,
}

impl FnBinding {
    pub fn new(
        description: impl Into<String>,
        plan: impl Fn(&Value) -> Result<EndpointCall, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object" }),
            plan: Box::new(plan),
        }
    }

    pub fn with_input_schema(mut self, input_schema: Value) -> Self {
        self.input_schema = input_schema;
        self
    }
}

impl ToolBinding for FnBinding {
    fn tool_schema(&self, name: &str) -> ToolSchema {
        ToolSchema {
            name: name.to_string(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    fn plan(&self, name: &str, arguments: &Value) -> Result<PlannedCall, BridgeError> {
        let arguments = normalize_arguments(arguments);
        let Value::Object(echo) = arguments else {
            return Err(BridgeError::invalid_arguments(
                name,
                "arguments must be a JSON object",
            ));
        };
        let call = (self.plan)(&Value::Object(echo.clone()))
            .map_err(|reason| BridgeError::invalid_arguments(name, reason))?;
        Ok(PlannedCall { call, echo })
    }
}

fn normalize_arguments(arguments: &Value) -> Value {
    match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    }
}

struct InvocationRecord {
    invocation: ToolInvocation,
    latest: Option<Correlation>,
}

/// Registered tools plus every invocation made through them.
///
/// Invocation state is never stored: it is derived on read from the
/// invocation and its latest correlation record.
#[derive(Default)]
pub struct ToolInvocationRegistry {
    bindings: BTreeMap<String, Box<dyn ToolBinding>>,
    invocations: HashMap<InvocationId, InvocationRecord>,
}

impl ToolInvocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `get_patients`, `get_reports` and
    /// `get_patient_chart`.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.register_tool(GetPatients);
        registry.register_tool(GetReports);
        registry.register_tool(GetPatientChart);
        registry
    }

    pub fn register(&mut self, tool_name: impl Into<String>, binding: impl ToolBinding + 'static) {
        let tool_name = tool_name.into();
        if self
            .bindings
            .insert(tool_name.clone(), Box::new(binding))
            .is_some()
        {
            tracing::debug!(tool_name = %tool_name, "Replaced tool binding");
        }
    }

    pub fn register_tool<T: EndpointTool>(&mut self, tool: T) {
        self.register(T::NAME, tool);
    }

    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.bindings.contains_key(tool_name)
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.bindings
            .iter()
            .map(|(name, binding)| binding.tool_schema(name))
            .collect()
    }

    /// Create a `Pending` invocation. Never touches the backend.
    pub fn invoke(
        &mut self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<(ToolInvocation, PendingDescriptor), BridgeError> {
        let binding = self
            .bindings
            .get(tool_name)
            .ok_or_else(|| BridgeError::UnknownTool(tool_name.to_string()))?;
        let PlannedCall { call, echo } = binding.plan(tool_name, &arguments)?;

        let invocation = ToolInvocation {
            id: InvocationId::new(),
            tool_name: tool_name.to_string(),
            arguments,
            call,
            created_at: Utc::now(),
        };
        let descriptor = PendingDescriptor {
            action: invocation.call.endpoint.to_string(),
            status: InvocationState::Pending.label().to_string(),
            arguments: echo,
        };

        tracing::debug!(
            invocation_id = %invocation.id,
            tool_name = %invocation.tool_name,
            endpoint = %invocation.call.endpoint,
            "Registered invocation"
        );

        self.invocations.insert(
            invocation.id,
            InvocationRecord {
                invocation: invocation.clone(),
                latest: None,
            },
        );

        Ok((invocation, descriptor))
    }

    pub fn get(&self, id: InvocationId) -> Option<&ToolInvocation> {
        self.invocations.get(&id).map(|record| &record.invocation)
    }

    pub fn state(&self, id: InvocationId) -> Option<InvocationState> {
        self.invocations
            .get(&id)
            .map(|record| InvocationState::derive(record.latest.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    /// `Pending → Running`. Returns the new state, or `None` if the
    /// invocation is unknown or already past `Pending`.
    pub fn mark_running(&mut self, id: InvocationId) -> Option<InvocationState> {
        let record = self.invocations.get_mut(&id)?;
        if record.latest.is_some() {
            tracing::debug!(invocation_id = %id, "Ignoring duplicate running transition");
            return None;
        }
        record.latest = Some(Correlation::Dispatched);
        Some(InvocationState::Running)
    }

    /// Move a non-terminal invocation to `Completed` or `Failed`. Returns the
    /// new state, or `None` if there was nothing to transition.
    pub fn resolve(
        &mut self,
        id: InvocationId,
        outcome: Result<ApiData, InvocationError>,
    ) -> Option<InvocationState> {
        let record = self.invocations.get_mut(&id)?;
        if record.latest.as_ref().is_some_and(Correlation::is_resolved) {
            tracing::warn!(invocation_id = %id, "Ignoring resolution of terminal invocation");
            return None;
        }
        let correlation = Correlation::Resolved(outcome);
        let state = InvocationState::derive(Some(&correlation));
        record.latest = Some(correlation);
        tracing::info!(invocation_id = %id, state = state.label(), "Invocation resolved");
        Some(state)
    }
}
