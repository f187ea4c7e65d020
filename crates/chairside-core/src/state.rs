use std::collections::VecDeque;

use chairside_proto::{ApiLogPayload, BackendStatus, Endpoint};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "endpoint", rename_all = "snake_case")]
pub enum Activity {
    Idle,
    Connecting,
    Running(Endpoint),
    Error,
}

/// Process-wide view of the backend channel.
///
/// Only the bridge runtime holds a mutable copy; everyone else reads
/// snapshots through [`crate::bridge::BridgeHandle::channel_state`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelState {
    pub is_connected: bool,
    pub activity: Activity,
    pub last_status_message: Option<String>,
    pub backend_status: Option<BackendStatus>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            is_connected: false,
            activity: Activity::Idle,
            last_status_message: None,
            backend_status: None,
        }
    }
}

impl ChannelState {
    pub fn running_endpoint(&self) -> Option<&Endpoint> {
        match &self.activity {
            Activity::Running(endpoint) => Some(endpoint),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_endpoint().is_some()
    }

    pub fn is_running_endpoint(&self, endpoint: &Endpoint) -> bool {
        self.running_endpoint() == Some(endpoint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Other(String),
}

impl LogLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "debug" | "trace" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warning,
            "error" | "critical" | "fatal" => LogLevel::Error,
            _ => LogLevel::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub message: String,
    pub timestamp: f64,
    pub level: LogLevel,
    /// Endpoint that was running when the entry arrived.
    pub endpoint: Option<Endpoint>,
}

impl LogEntry {
    pub fn from_payload(payload: ApiLogPayload, endpoint: Option<Endpoint>) -> Self {
        Self {
            level: LogLevel::parse(&payload.level),
            message: payload.message,
            timestamp: payload.timestamp,
            endpoint,
        }
    }
}

/// Progress log for the running endpoint. Cleared whenever a new endpoint
/// starts; bounded so a chatty backend cannot grow it without limit.
#[derive(Debug, Clone)]
pub struct LogBook {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBook {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            message: message.to_string(),
            timestamp: 0.0,
            level: LogLevel::Info,
            endpoint: None,
        }
    }

    #[rstest]
    #[case("INFO", LogLevel::Info)]
    #[case("warning", LogLevel::Warning)]
    #[case("warn", LogLevel::Warning)]
    #[case("critical", LogLevel::Error)]
    #[case("debug", LogLevel::Debug)]
    #[case("success", LogLevel::Other("success".to_string()))]
    fn parses_backend_levels(#[case] raw: &str, #[case] expected: LogLevel) {
        assert_eq!(LogLevel::parse(raw), expected);
    }

    #[test]
    fn log_book_drops_oldest_when_full() {
        let mut logs = LogBook::with_capacity(2);
        logs.push(entry("one"));
        logs.push(entry("two"));
        logs.push(entry("three"));

        let messages: Vec<_> = logs.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn running_endpoint_reflects_activity() {
        let mut state = ChannelState::default();
        assert!(!state.is_running());

        state.activity = Activity::Running(Endpoint::Reports);
        assert!(state.is_running_endpoint(&Endpoint::Reports));
        assert!(!state.is_running_endpoint(&Endpoint::Patients));
    }
}
