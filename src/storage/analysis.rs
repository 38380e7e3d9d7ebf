//! Offline analysis of a snapshot file.
//!
//! Snapshots are cumulative, so the last snapshot per interface describes
//! the whole run for that interface.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{error, warn};

use crate::error_handling::types::StorageError;
use crate::flow_capture::types::AggregateSnapshot;

/// Interfaces that moved the most bytes through the NAT in each direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficSummary {
    pub interfaces: usize,
    pub busiest_inbound: Option<(String, u64)>,
    pub busiest_outbound: Option<(String, u64)>,
}

/// Loads the last snapshot of every interface, keyed by interface ID.
///
/// A missing file is an empty run.
pub fn load_latest_snapshots(path: &Path) -> Result<BTreeMap<String, AggregateSnapshot>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Snapshot file {} does not exist", path.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return Err(StorageError::ReadFailed);
        }
    };

    let mut latest = BTreeMap::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let snapshot: AggregateSnapshot = serde_json::from_str(line).map_err(|e| {
            StorageError::Corrupted(format!("{} line {}: {}", path.display(), number + 1, e))
        })?;
        latest.insert(snapshot.interface_id.clone(), snapshot);
    }
    Ok(latest)
}

/// Picks the interfaces with the largest inbound and outbound totals.
///
/// Ties go to the lexicographically smaller interface ID; interfaces that
/// never saw traffic in a direction are not candidates for it.
pub fn summarize(latest: &BTreeMap<String, AggregateSnapshot>) -> TrafficSummary {
    let mut summary = TrafficSummary {
        interfaces: latest.len(),
        ..TrafficSummary::default()
    };
    for (id, snapshot) in latest {
        let agg = &snapshot.aggregate;
        if agg.total_bytes_in > summary.busiest_inbound.as_ref().map_or(0, |(_, b)| *b) {
            summary.busiest_inbound = Some((id.clone(), agg.total_bytes_in));
        }
        if agg.total_bytes_out > summary.busiest_outbound.as_ref().map_or(0, |(_, b)| *b) {
            summary.busiest_outbound = Some((id.clone(), agg.total_bytes_out));
        }
    }
    summary
}

pub fn analyze_file(path: &Path) -> Result<TrafficSummary, StorageError> {
    Ok(summarize(&load_latest_snapshots(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_capture::types::InterfaceAggregate;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn line(id: &str, bytes_in: u64, bytes_out: u64) -> String {
        let snapshot = AggregateSnapshot {
            interface_id: id.to_string(),
            timestamp: Utc::now(),
            aggregate: InterfaceAggregate {
                total_bytes_in: bytes_in,
                total_bytes_out: bytes_out,
                ..InterfaceAggregate::default()
            },
        };
        serde_json::to_string(&snapshot).unwrap()
    }

    #[test]
    fn last_snapshot_per_interface_wins() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", line("eni-a", 100, 0)).unwrap();
        writeln!(file, "{}", line("eni-b", 50, 900)).unwrap();
        writeln!(file, "{}", line("eni-a", 700, 10)).unwrap();

        let latest = load_latest_snapshots(file.path()).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["eni-a"].aggregate.total_bytes_in, 700);

        let summary = summarize(&latest);
        assert_eq!(summary.interfaces, 2);
        assert_eq!(summary.busiest_inbound, Some(("eni-a".to_string(), 700)));
        assert_eq!(summary.busiest_outbound, Some(("eni-b".to_string(), 900)));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let summary = analyze_file(&dir.path().join("none.log")).unwrap();
        assert_eq!(summary, TrafficSummary::default());
    }

    #[test]
    fn idle_interfaces_are_not_reported() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", line("eni-a", 0, 0)).unwrap();
        let summary = analyze_file(file.path()).unwrap();
        assert_eq!(summary.interfaces, 1);
        assert!(summary.busiest_inbound.is_none());
        assert!(summary.busiest_outbound.is_none());
    }

    #[test]
    fn corrupt_line_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", line("eni-a", 1, 1)).unwrap();
        writeln!(file, "{{not json").unwrap();
        let err = analyze_file(file.path()).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(ref msg) if msg.contains("line 2")));
    }
}
