//! Per-subnet interface membership watcher.
//!
//! Polls the interface inventory of one subnet at a fixed interval, diffs the
//! result against what the supervisor tracks for that subnet and drives
//! `on_added`/`on_removed` accordingly. A failed inventory call skips the
//! cycle: it never reads as "every interface is gone".
//!
//! Each interface is persisted once per appearance. A recorder that releases
//! itself and gets re-added on a later cycle is not a new discovery; an
//! interface that leaves the inventory and comes back is.

use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::types::{diff_interfaces, InterfaceDiff};
use crate::error_handling::types::SourceError;
use crate::log_source::source_trait::InterfaceInventory;
use crate::recorder_management::supervisor::RecorderSupervisor;
use crate::storage::Storage;

pub struct InterfaceSetWatcher {
    subnet_id: String,
    log_group: String,
    inventory: Arc<dyn InterfaceInventory>,
    supervisor: Arc<RecorderSupervisor>,
    storage: Arc<dyn Storage>,
    interval: Duration,
    persisted: Mutex<HashSet<String>>,
}

impl InterfaceSetWatcher {
    pub fn new(
        subnet_id: &str,
        log_group: &str,
        inventory: Arc<dyn InterfaceInventory>,
        supervisor: Arc<RecorderSupervisor>,
        storage: Arc<dyn Storage>,
        interval: Duration,
    ) -> Self {
        Self {
            subnet_id: subnet_id.to_string(),
            log_group: log_group.to_string(),
            inventory,
            supervisor,
            storage,
            interval,
            persisted: Mutex::new(HashSet::new()),
        }
    }

    fn first_appearance(&self, interface_id: &str) -> bool {
        self.persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interface_id.to_string())
    }

    /// Runs one discovery cycle and returns the applied diff.
    pub async fn poll_once(&self) -> Result<InterfaceDiff, SourceError> {
        let interfaces = self.inventory.list_interfaces(&self.subnet_id).await?;
        let current: HashSet<String> = interfaces.iter().map(|i| i.id.clone()).collect();
        let tracked: HashSet<String> = self
            .supervisor
            .tracked_ids(&self.subnet_id)
            .into_iter()
            .collect();
        let diff = diff_interfaces(&tracked, &current);

        if !diff.is_empty() {
            info!(
                "Subnet {} Added interfaces: {:?} Removed interfaces: {:?}",
                self.subnet_id, diff.added, diff.removed
            );
        }

        {
            let mut persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
            persisted.retain(|id| current.contains(id));
        }

        let discovered_at = Utc::now();
        for interface in interfaces.iter().filter(|i| diff.added.contains(&i.id)) {
            if self.first_appearance(&interface.id) {
                if let Err(e) = self.storage.save_interface(interface, discovered_at) {
                    warn!("[{}] Failed to record discovery: {}", interface.id, e);
                }
            } else {
                debug!("[{}] Tracking again after its recorder stopped", interface.id);
            }
            self.supervisor
                .on_added(&interface.id, &self.subnet_id, &self.log_group);
        }

        let mut removals = JoinSet::new();
        for id in diff.removed.iter().cloned() {
            let supervisor = Arc::clone(&self.supervisor);
            removals.spawn(async move { supervisor.on_removed(&id).await });
        }
        while let Some(joined) = removals.join_next().await {
            if let Err(e) = joined {
                warn!("Subnet {} removal task failed: {}", self.subnet_id, e);
            }
        }

        debug!(
            "Subnet {} Current: {} interfaces",
            self.subnet_id,
            current.len()
        );
        Ok(diff)
    }

    /// Polls until `cancel` fires. The first cycle runs immediately.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Subnet {} watching interfaces every {:?} (log group {})",
            self.subnet_id, self.interval, self.log_group
        );
        loop {
            let cycle = tokio::select! {
                _ = cancel.cancelled() => break,
                cycle = self.poll_once() => cycle,
            };
            if let Err(e) = cycle {
                warn!(
                    "Subnet {} inventory failed, skipping cycle: {}",
                    self.subnet_id, e
                );
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Subnet {} watcher stopped", self.subnet_id);
    }
}
