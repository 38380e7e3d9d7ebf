//! Data types flowing through the capture pipeline: parsed flow records and
//! the per-interface throughput aggregate derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Which side of the NAT a flow originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Public source, private destination.
    Inbound,
    /// Private source, public destination.
    Outbound,
}

/// Address, port and counter fields present only on records carrying traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficFields {
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub packet_count: u64,
    pub byte_count: u64,
    pub action: String,
}

/// One parsed flow-log line.
///
/// Heartbeat records (`NODATA`/`SKIPDATA`) carry only the header fields and
/// have `traffic == None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub version: String,
    pub account_id: String,
    pub interface_id: String,
    pub start_epoch_sec: u64,
    pub end_epoch_sec: u64,
    pub log_status: String,
    pub traffic: Option<TrafficFields>,
}

impl FlowRecord {
    pub fn is_heartbeat(&self) -> bool {
        self.traffic.is_none()
    }

    /// Length of the capture window, floored at one second.
    pub fn duration_secs(&self) -> u64 {
        self.end_epoch_sec.saturating_sub(self.start_epoch_sec).max(1)
    }
}

/// Running NAT throughput statistics of one interface.
///
/// Minima start at `u64::MAX` so that the first observed rate always lowers
/// them; a direction never observed keeps its minimum at `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAggregate {
    pub min_bytes_per_min_in: u64,
    pub max_bytes_per_min_in: u64,
    pub total_bytes_in: u64,
    pub total_duration_sec_in: u64,
    pub min_bytes_per_min_out: u64,
    pub max_bytes_per_min_out: u64,
    pub total_bytes_out: u64,
    pub total_duration_sec_out: u64,
}

impl Default for InterfaceAggregate {
    fn default() -> Self {
        Self {
            min_bytes_per_min_in: u64::MAX,
            max_bytes_per_min_in: 0,
            total_bytes_in: 0,
            total_duration_sec_in: 0,
            min_bytes_per_min_out: u64::MAX,
            max_bytes_per_min_out: 0,
            total_bytes_out: 0,
            total_duration_sec_out: 0,
        }
    }
}

/// Persisted, read-only view of an aggregate at the moment it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub interface_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub aggregate: InterfaceAggregate,
}
