//! Storage Trait
//!
//! This module defines the `Storage` trait, the sink every recording component
//! writes its data through. A single instance is built at startup and handed
//! to each component as `Arc<dyn Storage>`.
//!
//! Implementors are responsible for:
//! - Appending aggregate snapshots
//! - Recording newly discovered interfaces
//! - Optionally echoing processed flow records

use chrono::{DateTime, Utc};

use crate::discovery::types::NetworkInterface;
use crate::error_handling::types::StorageError;
use crate::flow_capture::types::{AggregateSnapshot, FlowRecord};

pub trait Storage: Send + Sync {
    /// Appends one aggregate snapshot.
    fn save_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), StorageError>;

    /// Records an interface the first time it is discovered.
    fn save_interface(
        &self,
        interface: &NetworkInterface,
        discovered_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Echoes one processed traffic record. Backends may ignore it.
    fn save_record(&self, record: &FlowRecord) -> Result<(), StorageError>;
}
