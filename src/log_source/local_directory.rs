//! Filesystem-backed log source.
//!
//! Serves interface inventory, flow-log bindings and flow-log streams out of
//! a directory tree, so the recorder can run against exported or synthetic
//! flow logs:
//!
//! ```text
//! <root>/interfaces/<subnet-id>.json   JSON array of interfaces
//! <root>/flow-logs/<subnet-id>         name of the bound log group
//! <root>/groups/<group>/<stream>       one flow-log line per line
//! ```
//!
//! Forward tokens have the form `f/<line-index>`.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

use super::source_trait::{FlowLogProvisioner, FlowLogSource, InterfaceInventory};
use super::types::{EventPage, GetEventsRequest, LogEvent, LogStream, StreamPage};
use crate::discovery::types::NetworkInterface;
use crate::error_handling::types::SourceError;
use crate::flow_capture::parser::FIELD_COUNT;

pub const STREAM_PAGE_SIZE: usize = 50;
const TOKEN_PREFIX: &str = "f/";

pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// The directory layout carries no region; `region` is only logged.
    pub fn new(root: impl Into<PathBuf>, region: &str) -> Self {
        let root = root.into();
        debug!("Directory source at {} for region {}", root.display(), region);
        Self { root }
    }

    fn interfaces_file(&self, subnet_id: &str) -> PathBuf {
        self.root.join("interfaces").join(format!("{}.json", subnet_id))
    }

    fn binding_file(&self, subnet_id: &str) -> PathBuf {
        self.root.join("flow-logs").join(subnet_id)
    }

    fn group_dir(&self, group: &str) -> PathBuf {
        self.root.join("groups").join(group)
    }
}

/// Event timestamp: the record's `start` field in milliseconds, or 0.
fn line_timestamp_ms(line: &str) -> i64 {
    let fields: Vec<&str> = line.split_ascii_whitespace().collect();
    if fields.len() != FIELD_COUNT {
        return 0;
    }
    fields[10]
        .parse::<i64>()
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(0)
}

fn parse_token(token: &str) -> Result<usize, SourceError> {
    token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|index| index.parse().ok())
        .ok_or_else(|| SourceError::Transient(format!("invalid forward token '{}'", token)))
}

fn format_token(index: usize) -> String {
    format!("{}{}", TOKEN_PREFIX, index)
}

#[async_trait]
impl InterfaceInventory for DirectorySource {
    async fn list_interfaces(
        &self,
        subnet_id: &str,
    ) -> Result<Vec<NetworkInterface>, SourceError> {
        let path = self.interfaces_file(subnet_id);
        let content = fs::read_to_string(&path).await?;
        let mut interfaces: Vec<NetworkInterface> = serde_json::from_str(&content)
            .map_err(|e| SourceError::Transient(format!("{}: {}", path.display(), e)))?;
        for interface in interfaces.iter_mut() {
            if interface.subnet_id.is_empty() {
                interface.subnet_id = subnet_id.to_string();
            }
        }
        Ok(interfaces)
    }
}

#[async_trait]
impl FlowLogProvisioner for DirectorySource {
    async fn find_flow_log_groups(
        &self,
        subnets: &[String],
    ) -> Result<HashMap<String, String>, SourceError> {
        let mut bindings = HashMap::new();
        for subnet in subnets {
            match fs::read_to_string(self.binding_file(subnet)).await {
                Ok(content) => {
                    let group = content.trim();
                    if !group.is_empty() {
                        bindings.insert(subnet.clone(), group.to_string());
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(bindings)
    }

    async fn ensure_log_group(&self, name: &str) -> Result<(), SourceError> {
        fs::create_dir_all(self.group_dir(name)).await?;
        Ok(())
    }

    async fn ensure_flow_log(&self, subnet_id: &str, group: &str) -> Result<(), SourceError> {
        let binding = self.binding_file(subnet_id);
        if fs::try_exists(&binding).await? {
            debug!("Flow log for {} already bound", subnet_id);
            return Ok(());
        }
        if let Some(parent) = binding.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&binding, format!("{}\n", group)).await?;
        Ok(())
    }
}

#[async_trait]
impl FlowLogSource for DirectorySource {
    async fn list_streams(
        &self,
        group: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<StreamPage, SourceError> {
        let mut entries = fs::read_dir(self.group_dir(group)).await?;
        let mut streams = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) {
                continue;
            }
            let created_ms = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| chrono::DateTime::<Utc>::from(t).timestamp_millis())
                .unwrap_or(0);
            streams.push(LogStream { name, created_ms });
        }
        streams.sort_by(|a, b| a.name.cmp(&b.name));

        let offset = match page_token {
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| SourceError::Transient(format!("invalid page token '{}'", t)))?,
            None => 0,
        };
        let end = (offset + STREAM_PAGE_SIZE).min(streams.len());
        let next_token = if end < streams.len() {
            Some(end.to_string())
        } else {
            None
        };
        let page = streams
            .into_iter()
            .skip(offset)
            .take(STREAM_PAGE_SIZE)
            .collect();
        Ok(StreamPage {
            streams: page,
            next_token,
        })
    }

    async fn get_events(&self, request: &GetEventsRequest) -> Result<EventPage, SourceError> {
        let path = self.group_dir(&request.group).join(&request.stream);
        let content = fs::read_to_string(&path).await?;
        let lines: Vec<&str> = content.lines().collect();

        let (start, resumed) = match request.token.as_deref() {
            Some(token) => (parse_token(token)?, true),
            None => (0, false),
        };

        let ingestion_time_ms = Utc::now().timestamp_millis();
        let mut events = Vec::new();
        let mut index = start.min(lines.len());
        while index < lines.len() && events.len() < request.limit {
            let line = lines[index];
            index += 1;
            if line.trim().is_empty() {
                continue;
            }
            let timestamp_ms = line_timestamp_ms(line);
            if !resumed {
                if request.start_time_ms.map_or(false, |floor| timestamp_ms < floor) {
                    continue;
                }
                if request.end_time_ms.map_or(false, |ceil| timestamp_ms > ceil) {
                    continue;
                }
            }
            events.push(LogEvent {
                timestamp_ms,
                ingestion_time_ms,
                message: line.to_string(),
            });
        }

        Ok(EventPage {
            events,
            next_forward_token: Some(format_token(index)),
        })
    }
}
