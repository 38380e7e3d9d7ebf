use serde::{Deserialize, Serialize};

/// A log stream inside a log group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStream {
    pub name: String,
    pub created_ms: i64,
}

/// One page of a stream listing.
#[derive(Debug, Clone, Default)]
pub struct StreamPage {
    pub streams: Vec<LogStream>,
    pub next_token: Option<String>,
}

/// A single flow-log event as returned by the log source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp_ms: i64,
    pub ingestion_time_ms: i64,
    pub message: String,
}

/// Parameters of one `get_events` call.
///
/// `start_time_ms`/`end_time_ms` only narrow the first page, once a forward
/// token is present the source resumes from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEventsRequest {
    pub group: String,
    pub stream: String,
    pub token: Option<String>,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<LogEvent>,
    pub next_forward_token: Option<String>,
}

/// Subnet to log-group association, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroupBinding {
    pub subnet_id: String,
    pub log_group: String,
}
