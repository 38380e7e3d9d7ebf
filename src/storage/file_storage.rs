use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;

use crate::configuration::types::OutputSettings;
use crate::discovery::types::NetworkInterface;
use crate::error_handling::types::StorageError;
use crate::flow_capture::types::{AggregateSnapshot, FlowRecord, TrafficFields};
use crate::storage::storage_trait::Storage;

/// JSON-lines file backend.
///
/// Each output is an append-only file; concurrent writers are serialised per
/// file so lines never interleave.
pub struct FileStorage {
    snapshots: JsonLinesFile,
    interfaces: JsonLinesFile,
    records: Option<JsonLinesFile>,
}

struct JsonLinesFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesFile {
    fn open(path: &Path, truncate: bool) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| { error!("Failed to create output dir {}: {}", parent.display(), e); StorageError::WriteFailed })?;
        }
        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path).map_err(|e| { error!("Failed to open {}: {}", path.display(), e); StorageError::WriteFailed })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    fn append<T: Serialize>(&self, value: &T) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(value).map_err(|e| { error!("Failed to serialize line for {}: {}", self.path.display(), e); StorageError::WriteFailed })?;
        line.push('\n');
        let mut file = self.file.lock().map_err(|_| { error!("Writer lock poisoned for {}", self.path.display()); StorageError::WriteFailed })?;
        file.write_all(line.as_bytes()).map_err(|e| { error!("Write failed {}: {}", self.path.display(), e); StorageError::WriteFailed })?;
        Ok(())
    }
}

#[derive(Serialize)]
struct DiscoveredInterfaceLine<'a> {
    discovered_at: DateTime<Utc>,
    #[serde(flatten)]
    interface: &'a NetworkInterface,
}

#[derive(Serialize)]
struct RecordLine<'a> {
    version: &'a str,
    account_id: &'a str,
    interface_id: &'a str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    log_status: &'a str,
    #[serde(flatten)]
    traffic: Option<&'a TrafficFields>,
}

fn epoch_to_utc(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
}

impl FileStorage {
    pub fn new(settings: &OutputSettings) -> Result<Self, StorageError> {
        let truncate = settings.truncate_on_start;
        let snapshots = JsonLinesFile::open(&settings.snapshots_path, truncate)?;
        let interfaces = JsonLinesFile::open(&settings.interfaces_path, truncate)?;
        let records = match settings.records_path() {
            Some(path) => Some(JsonLinesFile::open(path, truncate)?),
            None => None,
        };
        info!(
            "FileStorage writing snapshots to {}{}",
            settings.snapshots_path.display(),
            if truncate { " (truncated)" } else { "" }
        );
        Ok(Self {
            snapshots,
            interfaces,
            records,
        })
    }

    pub fn snapshots_path(&self) -> &Path {
        &self.snapshots.path
    }
}

impl Storage for FileStorage {
    fn save_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), StorageError> {
        self.snapshots.append(snapshot)?;
        debug!("[{}] Snapshot appended to {}", snapshot.interface_id, self.snapshots.path.display());
        Ok(())
    }

    fn save_interface(
        &self,
        interface: &NetworkInterface,
        discovered_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.interfaces.append(&DiscoveredInterfaceLine {
            discovered_at,
            interface,
        })
    }

    fn save_record(&self, record: &FlowRecord) -> Result<(), StorageError> {
        let records = match &self.records {
            Some(r) => r,
            None => return Ok(()),
        };
        records.append(&RecordLine {
            version: &record.version,
            account_id: &record.account_id,
            interface_id: &record.interface_id,
            start: epoch_to_utc(record.start_epoch_sec),
            end: epoch_to_utc(record.end_epoch_sec),
            log_status: &record.log_status,
            traffic: record.traffic.as_ref(),
        })
    }
}
