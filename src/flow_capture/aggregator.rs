//! Per-interface NAT throughput aggregation.
//!
//! A record counts towards the aggregate only when exactly one endpoint is a
//! private address: private source means traffic leaving through the NAT
//! (outbound), private destination means traffic coming back (inbound).
//! Private-to-private flows never cross the NAT and are ignored; public-to-public
//! flows cannot be classified and are reported as errors.

use chrono::Utc;
use std::net::{IpAddr, Ipv6Addr};

use super::types::{AggregateSnapshot, Direction, FlowRecord, InterfaceAggregate};
use crate::error_handling::types::ClassificationError;

/// RFC 1918 IPv4 ranges and the fc00::/7 unique-local IPv6 range.
pub fn is_private_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.is_private(),
            None => is_unique_local(&v6),
        },
    }
}

fn is_unique_local(addr: &Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xfe00) == 0xfc00
}

/// Decides which NAT direction a traffic record belongs to.
///
/// `Ok(None)` for heartbeats and private-to-private flows.
pub fn classify(record: &FlowRecord) -> Result<Option<Direction>, ClassificationError> {
    let traffic = match &record.traffic {
        Some(t) => t,
        None => return Ok(None),
    };
    let private_src = is_private_address(traffic.src_addr);
    let private_dst = is_private_address(traffic.dst_addr);
    match (private_src, private_dst) {
        (true, true) => Ok(None),
        (false, false) => Err(ClassificationError::PublicToPublic {
            src: traffic.src_addr,
            dst: traffic.dst_addr,
        }),
        (true, false) => Ok(Some(Direction::Outbound)),
        (false, true) => Ok(Some(Direction::Inbound)),
    }
}

/// Integer bytes-per-minute over the record's (floored) capture window.
pub fn bytes_per_minute(bytes: u64, duration_secs: u64) -> u64 {
    bytes.saturating_mul(60) / duration_secs.max(1)
}

/// Owns the running aggregate of a single interface.
///
/// Snapshots are only produced when the aggregate differs from the last one
/// handed out, so repeated no-op observations never cause redundant writes.
#[derive(Debug)]
pub struct ByteAggregator {
    interface_id: String,
    current: InterfaceAggregate,
    last_emitted: InterfaceAggregate,
}

impl ByteAggregator {
    pub fn new(interface_id: impl Into<String>) -> Self {
        Self {
            interface_id: interface_id.into(),
            current: InterfaceAggregate::default(),
            last_emitted: InterfaceAggregate::default(),
        }
    }

    pub fn interface_id(&self) -> &str {
        &self.interface_id
    }

    pub fn aggregate(&self) -> &InterfaceAggregate {
        &self.current
    }

    /// Folds one record into the aggregate.
    ///
    /// Returns the new snapshot when the aggregate changed. On error the
    /// aggregate is left untouched.
    pub fn observe(
        &mut self,
        record: &FlowRecord,
    ) -> Result<Option<AggregateSnapshot>, ClassificationError> {
        let direction = match classify(record)? {
            Some(d) => d,
            None => return Ok(None),
        };
        let bytes = match &record.traffic {
            Some(t) => t.byte_count,
            None => return Ok(None),
        };

        let duration = record.duration_secs();
        let rate = bytes_per_minute(bytes, duration);
        let agg = &mut self.current;

        match direction {
            Direction::Outbound => {
                agg.max_bytes_per_min_out = agg.max_bytes_per_min_out.max(rate);
                agg.min_bytes_per_min_out = agg.min_bytes_per_min_out.min(rate);
                agg.total_bytes_out = agg.total_bytes_out.saturating_add(bytes);
                agg.total_duration_sec_out = agg.total_duration_sec_out.saturating_add(duration);
            }
            Direction::Inbound => {
                agg.max_bytes_per_min_in = agg.max_bytes_per_min_in.max(rate);
                agg.min_bytes_per_min_in = agg.min_bytes_per_min_in.min(rate);
                agg.total_bytes_in = agg.total_bytes_in.saturating_add(bytes);
                agg.total_duration_sec_in = agg.total_duration_sec_in.saturating_add(duration);
            }
        }

        Ok(self.take_snapshot_if_changed())
    }

    fn take_snapshot_if_changed(&mut self) -> Option<AggregateSnapshot> {
        if self.current == self.last_emitted {
            return None;
        }
        self.last_emitted = self.current;
        Some(AggregateSnapshot {
            interface_id: self.interface_id.clone(),
            timestamp: Utc::now(),
            aggregate: self.current,
        })
    }
}
