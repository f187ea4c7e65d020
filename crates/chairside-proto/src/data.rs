//! Typed response data, one shape per known endpoint.
//!
//! The backend extracts these records by driving a desktop application, so
//! nearly every field is optional. Fields that are not modelled here are kept
//! in `extra` instead of being dropped, and numeric fields that arrive as
//! screen text (`"$1,250.00"`) are kept as [`Lenient::Raw`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::endpoint::Endpoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiData {
    Patients(PatientsData),
    Report(ReportData),
    Chart(ChartData),
    Other(Value),
}

impl ApiData {
    /// Validate `data` against the shape expected for `endpoint`.
    pub fn for_endpoint(endpoint: &Endpoint, data: Value) -> Result<Self, serde_json::Error> {
        match endpoint {
            Endpoint::Patients => serde_json::from_value(data).map(ApiData::Patients),
            Endpoint::Reports => serde_json::from_value(data).map(ApiData::Report),
            Endpoint::PatientChart => serde_json::from_value(data).map(ApiData::Chart),
            Endpoint::Other(_) => Ok(ApiData::Other(data)),
        }
    }

    pub fn as_patients(&self) -> Option<&PatientsData> {
        match self {
            ApiData::Patients(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_report(&self) -> Option<&PatientReport> {
        match self {
            ApiData::Report(data) => Some(&data.patient_report),
            _ => None,
        }
    }

    pub fn as_chart(&self) -> Option<&PatientChart> {
        match self {
            ApiData::Chart(data) => Some(&data.patient_chart),
            _ => None,
        }
    }
}

/// A scalar that is usually a JSON number but may come through as text.
///
/// Whatever arrived is serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lenient<T> {
    Parsed(T),
    Raw(Value),
}

impl<T: Copy + FromStr> Lenient<T> {
    /// The numeric value, reading currency and thousands separators out of text.
    pub fn get(&self) -> Option<T> {
        match self {
            Lenient::Parsed(value) => Some(*value),
            Lenient::Raw(Value::String(text)) => {
                let cleaned: String = text
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
                    .collect();
                cleaned.parse().ok()
            }
            Lenient::Raw(Value::Number(number)) => number.to_string().parse().ok(),
            Lenient::Raw(_) => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Lenient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lenient::Parsed(value) => value.fmt(f),
            Lenient::Raw(Value::String(text)) => f.write_str(text),
            Lenient::Raw(other) => other.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientsData {
    #[serde(default)]
    pub patients: Vec<PatientRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Lenient<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<Lenient<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Lenient<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PatientRecord {
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => "Unknown patient".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub patient_report: PatientReport,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<Map<String, Value>>,
    /// Remaining report sections (family, insurance, account, ...).
    #[serde(flatten)]
    pub sections: Map<String, Value>,
}

impl PatientReport {
    pub fn patient_name(&self) -> Option<String> {
        let info = self.patient_info.as_ref()?;
        if let Some(name) = info.get("name").and_then(Value::as_str) {
            return Some(name.to_string());
        }
        let first = info.get("first_name").and_then(Value::as_str);
        let last = info.get("last_name").and_then(Value::as_str);
        match (first, last) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub patient_chart: PatientChart,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientChart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooth_chart: Option<Value>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_summary: Option<ProcedureSummary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Lenient<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ada_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcedureSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_procedures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_procedures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_planned_procedures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_charges: Option<Lenient<f64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
