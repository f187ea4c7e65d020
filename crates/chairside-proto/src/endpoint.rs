use std::fmt;

use serde::{Deserialize, Serialize};

pub const PATIENTS_ENDPOINT: &str = "patients";
pub const REPORTS_ENDPOINT: &str = "reports";
pub const PATIENT_CHART_ENDPOINT: &str = "patient_chart";

/// A named backend operation.
///
/// The three known endpoints get their own variants so that response data can
/// be validated per endpoint; anything else the backend grows is carried as
/// [`Endpoint::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Endpoint {
    Patients,
    Reports,
    PatientChart,
    Other(String),
}

impl Endpoint {
    pub fn as_str(&self) -> &str {
        match self {
            Endpoint::Patients => PATIENTS_ENDPOINT,
            Endpoint::Reports => REPORTS_ENDPOINT,
            Endpoint::PatientChart => PATIENT_CHART_ENDPOINT,
            Endpoint::Other(name) => name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Endpoint::Other(_))
    }
}

impl From<&str> for Endpoint {
    fn from(value: &str) -> Self {
        match value {
            PATIENTS_ENDPOINT => Endpoint::Patients,
            REPORTS_ENDPOINT => Endpoint::Reports,
            PATIENT_CHART_ENDPOINT => Endpoint::PatientChart,
            other => Endpoint::Other(other.to_string()),
        }
    }
}

impl From<String> for Endpoint {
    fn from(value: String) -> Self {
        match value.as_str() {
            PATIENTS_ENDPOINT | REPORTS_ENDPOINT | PATIENT_CHART_ENDPOINT => {
                Endpoint::from(value.as_str())
            }
            _ => Endpoint::Other(value),
        }
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        match value {
            Endpoint::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
