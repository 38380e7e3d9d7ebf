//! Collaborator seams
//!
//! The recorder pipeline never talks to a cloud API directly. Everything it
//! needs from the outside world goes through the three traits below:
//! - `InterfaceInventory`: which interfaces are attached to a subnet
//! - `FlowLogProvisioner`: which log group receives a subnet's flow logs
//! - `FlowLogSource`: paginated stream listing and event retrieval
//!
//! Implementations must be cheap to share (`Arc<dyn _>`) across every
//! recorder task.

use async_trait::async_trait;
use std::collections::HashMap;

use super::types::{EventPage, GetEventsRequest, LogStream, StreamPage};
use crate::discovery::types::NetworkInterface;
use crate::error_handling::types::SourceError;

#[async_trait]
pub trait InterfaceInventory: Send + Sync {
    /// Interfaces currently attached to `subnet_id`.
    async fn list_interfaces(&self, subnet_id: &str)
        -> Result<Vec<NetworkInterface>, SourceError>;
}

#[async_trait]
pub trait FlowLogProvisioner: Send + Sync {
    /// Existing subnet → log-group bindings for the given subnets. Subnets
    /// without a binding are absent from the map.
    async fn find_flow_log_groups(
        &self,
        subnets: &[String],
    ) -> Result<HashMap<String, String>, SourceError>;

    /// Creates the log group if it does not exist yet.
    async fn ensure_log_group(&self, name: &str) -> Result<(), SourceError>;

    /// Binds the subnet's flow log to `group`. Idempotent.
    async fn ensure_flow_log(&self, subnet_id: &str, group: &str) -> Result<(), SourceError>;
}

#[async_trait]
pub trait FlowLogSource: Send + Sync {
    async fn list_streams(
        &self,
        group: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<StreamPage, SourceError>;

    async fn get_events(&self, request: &GetEventsRequest) -> Result<EventPage, SourceError>;
}

/// Drains every page of `list_streams` for `prefix`.
pub async fn list_all_streams(
    source: &dyn FlowLogSource,
    group: &str,
    prefix: &str,
) -> Result<Vec<LogStream>, SourceError> {
    let mut streams = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = source.list_streams(group, prefix, token.as_deref()).await?;
        streams.extend(page.streams);
        match page.next_token {
            Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
            _ => return Ok(streams),
        }
    }
}
