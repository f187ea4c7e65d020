//! Human-readable rendering of bridge results and events.

use chairside_core::{BridgeEvent, LogEntry, ToolSchema};
use chairside_proto::{AgentRole, ApiData, Lenient, PatientChart, PatientReport, PatientsData};
use comfy_table::{Cell, Color, Table};
use serde_json::{Map, Value};

pub fn render_tools(schemas: &[ToolSchema]) -> String {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Tool").fg(Color::Green),
        Cell::new("Arguments").fg(Color::Green),
        Cell::new("Description").fg(Color::Green),
    ]);

    for schema in schemas {
        let arguments = schema
            .input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| properties.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&schema.name),
            Cell::new(arguments),
            Cell::new(&schema.description),
        ]);
    }

    table.to_string()
}

pub fn render_data(data: &ApiData) -> String {
    match data {
        ApiData::Patients(patients) => render_patients(patients),
        ApiData::Report(report) => render_report(&report.patient_report),
        ApiData::Chart(chart) => render_chart(&chart.patient_chart),
        ApiData::Other(value) => pretty(value),
    }
}

fn render_patients(data: &PatientsData) -> String {
    if data.patients.is_empty() {
        return "No patients found.".to_string();
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("ID").fg(Color::Green),
        Cell::new("Name").fg(Color::Green),
        Cell::new("Date of birth").fg(Color::Green),
        Cell::new("Phone").fg(Color::Green),
        Cell::new("Balance").fg(Color::Green),
    ]);

    for patient in &data.patients {
        table.add_row(vec![
            Cell::new(
                patient
                    .patient_id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ),
            Cell::new(patient.display_name()),
            Cell::new(patient.date_of_birth.as_deref().unwrap_or("")),
            Cell::new(patient.phone.as_deref().unwrap_or("")),
            Cell::new(money(patient.balance.as_ref())),
        ]);
    }

    let total = data.total_count.unwrap_or(data.patients.len() as u64);
    format!("{table}\n{total} patient(s)")
}

fn render_report(report: &PatientReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Report: {}\n",
        report.patient_name().unwrap_or_else(|| "Unknown patient".to_string())
    ));
    if let Some(generated_at) = &report.generated_at {
        output.push_str(&format!("Generated: {generated_at}\n"));
    }
    if let Some(info) = &report.patient_info {
        output.push_str(&render_section("patient_info", info));
    }
    for (name, section) in &report.sections {
        match section.as_object() {
            Some(fields) => output.push_str(&render_section(name, fields)),
            None => output.push_str(&format!("\n{name}: {section}\n")),
        }
    }
    output
}

fn render_chart(chart: &PatientChart) -> String {
    let mut output = String::new();
    if let Some(info) = &chart.patient_info {
        output.push_str(&render_section("patient_info", info));
    }

    if chart.procedures.is_empty() {
        output.push_str("\nNo procedures recorded.\n");
    } else {
        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("Date").fg(Color::Green),
            Cell::new("Tooth").fg(Color::Green),
            Cell::new("Surface").fg(Color::Green),
            Cell::new("Procedure").fg(Color::Green),
            Cell::new("Status").fg(Color::Green),
            Cell::new("Amount").fg(Color::Green),
        ]);
        for procedure in &chart.procedures {
            table.add_row(vec![
                Cell::new(procedure.date.as_deref().unwrap_or("")),
                Cell::new(procedure.tooth.as_deref().unwrap_or("")),
                Cell::new(procedure.surface.as_deref().unwrap_or("")),
                Cell::new(procedure.description.as_deref().unwrap_or("")),
                Cell::new(procedure.status.as_deref().unwrap_or("")),
                Cell::new(money(procedure.amount.as_ref())),
            ]);
        }
        output.push_str(&format!("\n{table}\n"));
    }

    if let Some(summary) = &chart.procedure_summary {
        output.push_str(&format!(
            "\nProcedures: {} total, {} completed, {} planned\n",
            summary.total_procedures.unwrap_or(0),
            summary.completed_procedures.unwrap_or(0),
            summary.treatment_planned_procedures.unwrap_or(0),
        ));
        if let Some(charges) = &summary.total_charges {
            output.push_str(&format!("Total charges: {}\n", money(Some(charges))));
        }
    }
    output
}

/// Two decimals when the amount reads as a number, otherwise the text as sent.
fn money(amount: Option<&Lenient<f64>>) -> String {
    match amount {
        Some(amount) => match amount.get() {
            Some(value) => format!("{value:.2}"),
            None => amount.to_string(),
        },
        None => String::new(),
    }
}

fn render_section(name: &str, fields: &Map<String, Value>) -> String {
    let mut output = format!("\n{name}:\n");
    for (key, value) in fields {
        let value = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        output.push_str(&format!("  {key}: {value}\n"));
    }
    output
}

pub fn render_logs(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("[{}] {}", entry.level.as_str(), entry.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line for an agent-facing event, or `None` if it is not worth showing.
pub fn render_event(event: &BridgeEvent) -> Option<String> {
    match event {
        BridgeEvent::AgentMessage { payload } => {
            let role = match payload.role {
                AgentRole::Assistant => "assistant",
                AgentRole::System => "system",
                AgentRole::Reasoning => "reasoning",
            };
            let mut line = format!("{role}: {}", payload.content);
            if let Some(action) = &payload.action {
                line.push_str(&format!(" ({action})"));
            }
            Some(line)
        }
        BridgeEvent::Screenshot { payload } => Some(format!("[screenshot step {}]", payload.step)),
        BridgeEvent::LogAppended { entry } => Some(format!("log: {}", entry.message)),
        BridgeEvent::BackendError { message } => Some(format!("error: {message}")),
        BridgeEvent::AgentComplete { .. } => Some("Agent finished.".to_string()),
        BridgeEvent::ChannelStateChanged { state } => state
            .last_status_message
            .as_ref()
            .map(|message| format!("status: {message}")),
        BridgeEvent::StaleResponseDiscarded { endpoint, .. } => {
            Some(format!("ignored late response from {endpoint}"))
        }
        BridgeEvent::InvocationRegistered { .. }
        | BridgeEvent::InvocationChanged { .. }
        | BridgeEvent::LogsCleared => None,
    }
}

pub fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}
