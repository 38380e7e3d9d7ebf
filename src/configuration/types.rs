use cidr::IpCidr;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error_handling::types::ConfigError;

/// Timing and sizing knobs of the recording engine.
///
/// Defaults mirror the production cadence: discovery every 30s, one tailing
/// burst per interface every 5s, at most 5 concurrent bursts process-wide and
/// a 15s grace period when an interface disappears.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordingSettings {
    pub worker_pool_size: usize,
    pub discovery_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub retry_backoff_secs: u64,
    pub removal_grace_secs: u64,
    pub events_page_limit: usize,
    /// When set, the very first burst of a recorder reads the stream from its
    /// head instead of from "now".
    pub start_from_head: bool,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            worker_pool_size: 5,
            discovery_interval_secs: 30,
            poll_interval_secs: 5,
            retry_backoff_secs: 5,
            removal_grace_secs: 15,
            events_page_limit: 100,
            start_from_head: false,
        }
    }
}

impl RecordingSettings {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn removal_grace(&self) -> Duration {
        Duration::from_secs(self.removal_grace_secs)
    }
}

/// Where the append-only output files live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub snapshots_path: PathBuf,
    pub interfaces_path: PathBuf,
    /// Empty path disables the per-record echo file.
    pub records_path: PathBuf,
    pub truncate_on_start: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            snapshots_path: PathBuf::from("/var/lib/natwatch/output/data.log"),
            interfaces_path: PathBuf::from("/var/lib/natwatch/output/interfaces.json"),
            records_path: PathBuf::new(),
            truncate_on_start: true,
        }
    }
}

impl OutputSettings {
    pub fn records_path(&self) -> Option<&PathBuf> {
        if self.records_path.as_os_str().is_empty() {
            None
        } else {
            Some(&self.records_path)
        }
    }

    /// Moves every configured output file into `dir`, keeping file names.
    pub fn rebase(&mut self, dir: &std::path::Path) {
        let rebase_one = |path: &PathBuf| -> PathBuf {
            match path.file_name() {
                Some(name) => dir.join(name),
                None => path.clone(),
            }
        };
        self.snapshots_path = rebase_one(&self.snapshots_path);
        self.interfaces_path = rebase_one(&self.interfaces_path);
        if self.records_path().is_some() {
            self.records_path = rebase_one(&self.records_path);
        }
    }
}

/// Backend providing interface inventory, flow-log bindings and log streams.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum SourceConfig {
    Directory { root: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Directory {
            root: PathBuf::from("/var/lib/natwatch/flowlogs"),
        }
    }
}

/// Parses one CIDR block such as `10.0.0.0/16`. A bare address is taken as a
/// single host; host bits set below the prefix are rejected.
pub fn parse_cidr(s: &str) -> Result<IpCidr, ConfigError> {
    s.trim()
        .parse::<IpCidr>()
        .map_err(|e| ConfigError::BadCidr(format!("'{}': {}", s.trim(), e)))
}

pub(crate) fn deserialize_cidrs<'de, D>(deserializer: D) -> Result<Vec<IpCidr>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|raw| parse_cidr(raw).map_err(de::Error::custom))
        .collect()
}
