//! Flow-log text line parser.
//!
//! Lines follow the default VPC flow-log layout, 14 space separated fields:
//!
//! ```text
//! ${version} ${account-id} ${interface-id} ${srcaddr} ${dstaddr} ${srcport} ${dstport}
//! ${protocol} ${packets} ${bytes} ${start} ${end} ${action} ${log-status}
//! ```

use std::net::IpAddr;
use std::str::FromStr;

use super::types::{FlowRecord, TrafficFields};
use crate::error_handling::types::ParseError;

pub const FIELD_COUNT: usize = 14;

const HEARTBEAT_MARKERS: [&str; 2] = ["NODATA", "SKIPDATA"];

/// Parses one flow-log line.
///
/// Lines marked `NODATA` (or `SKIPDATA`) yield a heartbeat record holding the
/// header fields only; callers must skip those before aggregation.
pub fn parse_flow_record(line: &str) -> Result<FlowRecord, ParseError> {
    let fields: Vec<&str> = line.split_ascii_whitespace().collect();
    if fields.len() != FIELD_COUNT {
        return Err(ParseError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let heartbeat = HEARTBEAT_MARKERS.iter().any(|m| line.contains(m));

    let start_epoch_sec = number(fields[10], "start")?;
    let end_epoch_sec = number(fields[11], "end")?;

    let traffic = if heartbeat {
        None
    } else {
        Some(TrafficFields {
            src_addr: address(fields[3], "srcaddr")?,
            dst_addr: address(fields[4], "dstaddr")?,
            src_port: number(fields[5], "srcport")?,
            dst_port: number(fields[6], "dstport")?,
            protocol: number(fields[7], "protocol")?,
            packet_count: number(fields[8], "packets")?,
            byte_count: number(fields[9], "bytes")?,
            action: fields[12].to_string(),
        })
    };

    Ok(FlowRecord {
        version: fields[0].to_string(),
        account_id: fields[1].to_string(),
        interface_id: fields[2].to_string(),
        start_epoch_sec,
        end_epoch_sec,
        log_status: fields[13].to_string(),
        traffic,
    })
}

impl FromStr for FlowRecord {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_flow_record(s)
    }
}

fn number<T: FromStr>(value: &str, field: &'static str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn address(value: &str, field: &'static str) -> Result<IpAddr, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}
