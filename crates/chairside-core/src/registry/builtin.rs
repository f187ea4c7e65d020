use chairside_proto::Endpoint;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::EndpointTool;
use crate::invocation::EndpointCall;

pub const GET_PATIENTS_TOOL_NAME: &str = "get_patients";
pub const GET_REPORTS_TOOL_NAME: &str = "get_reports";
pub const GET_PATIENT_CHART_TOOL_NAME: &str = "get_patient_chart";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetPatientsArgs {
    /// Patient name to search for. Leave empty to list patients.
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetReportsArgs {
    /// The patient name to generate report for
    pub patient_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetPatientChartArgs {
    /// The patient name to get chart for
    pub patient_name: String,
}

pub struct GetPatients;

impl EndpointTool for GetPatients {
    type Params = GetPatientsArgs;

    const NAME: &'static str = GET_PATIENTS_TOOL_NAME;
    const DESCRIPTION: &'static str = "Search for patients by name or get a list of patients from the dental practice management system";

    fn endpoint_call(&self, params: &GetPatientsArgs) -> Result<EndpointCall, String> {
        let call = EndpointCall::new(Endpoint::Patients);
        let query = params.query.trim();
        if query.is_empty() {
            Ok(call)
        } else {
            Ok(call.with_param("query", query))
        }
    }
}

pub struct GetReports;

impl EndpointTool for GetReports {
    type Params = GetReportsArgs;

    const NAME: &'static str = GET_REPORTS_TOOL_NAME;
    const DESCRIPTION: &'static str = "Generate and retrieve a detailed patient report including medical history, allergies, conditions, and treatment plan. You can use the patient's name directly.";

    fn endpoint_call(&self, params: &GetReportsArgs) -> Result<EndpointCall, String> {
        patient_call(Endpoint::Reports, &params.patient_name)
    }
}

pub struct GetPatientChart;

impl EndpointTool for GetPatientChart {
    type Params = GetPatientChartArgs;

    const NAME: &'static str = GET_PATIENT_CHART_TOOL_NAME;
    const DESCRIPTION: &'static str = "Get the dental chart for a patient showing tooth conditions, procedures, and treatment history. You can use the patient's name directly.";

    fn endpoint_call(&self, params: &GetPatientChartArgs) -> Result<EndpointCall, String> {
        patient_call(Endpoint::PatientChart, &params.patient_name)
    }
}

fn patient_call(endpoint: Endpoint, patient_name: &str) -> Result<EndpointCall, String> {
    let patient_name = patient_name.trim();
    if patient_name.is_empty() {
        return Err("patientName must not be empty".to_string());
    }
    Ok(EndpointCall::new(endpoint).with_param("patient_name", patient_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::registry::ToolBinding;
    use rstest::rstest;
    use serde_json::{Value, json};

    #[rstest]
    #[case(json!({}), None)]
    #[case(Value::Null, None)]
    #[case(json!({ "query": "  " }), None)]
    #[case(json!({ "query": "Smith" }), Some("Smith"))]
    fn patients_query_is_sent_only_when_present(
        #[case] arguments: Value,
        #[case] expected: Option<&str>,
    ) {
        let planned = GetPatients.plan(GET_PATIENTS_TOOL_NAME, &arguments).unwrap();

        assert_eq!(planned.call.endpoint, Endpoint::Patients);
        assert_eq!(
            planned.call.params.get("query").map(String::as_str),
            expected
        );
        // The descriptor always echoes the query, empty or not.
        assert!(planned.echo.contains_key("query"));
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({ "patientName": "" }))]
    #[case(json!({ "patient_name": "Jane Smith" }))]
    #[case(json!({ "patientName": 42 }))]
    fn chart_requires_patient_name(#[case] arguments: Value) {
        let err = GetPatientChart
            .plan(GET_PATIENT_CHART_TOOL_NAME, &arguments)
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidArguments { tool_name, .. } if tool_name == GET_PATIENT_CHART_TOOL_NAME
        ));
    }

    #[test]
    fn chart_maps_patient_name_to_snake_case_param() {
        let planned = GetPatientChart
            .plan(
                GET_PATIENT_CHART_TOOL_NAME,
                &json!({ "patientName": "Jane Smith" }),
            )
            .unwrap();

        assert_eq!(planned.call.endpoint, Endpoint::PatientChart);
        assert_eq!(
            planned.call.params.get("patient_name").map(String::as_str),
            Some("Jane Smith")
        );
        assert_eq!(planned.echo.get("patientName"), Some(&json!("Jane Smith")));
    }

    #[test]
    fn report_schema_requires_patient_name() {
        let schema = GetReports::schema();
        assert_eq!(schema.name, GET_REPORTS_TOOL_NAME);
        assert_eq!(schema.input_schema["required"], json!(["patientName"]));
        assert!(schema.input_schema["properties"]["patientName"].is_object());
    }
}
