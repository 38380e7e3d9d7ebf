use log::{error, info, warn};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::configuration::config::Config;
use crate::configuration::types::SourceConfig;
use crate::discovery::interface_watcher::InterfaceSetWatcher;
use crate::error_handling::types::*;
use crate::flow_capture::filter::AddressFilter;
use crate::flow_capture::recorder::RecorderContext;
use crate::flow_capture::worker_pool::WorkerPool;
use crate::log_source::local_directory::DirectorySource;
use crate::log_source::source_trait::{FlowLogProvisioner, FlowLogSource, InterfaceInventory};
use crate::log_source::types::LogGroupBinding;
use crate::recorder_management::supervisor::{RecorderSupervisor, RecordingMode};
use crate::storage::analysis::{self, TrafficSummary};
use crate::storage::Storage;

/// Name of the log group provisioned for a subnet without flow logs.
pub fn log_group_name(subnet_id: &str) -> String {
    format!("natwatch-{}", subnet_id)
}

/// External systems the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: Arc<dyn InterfaceInventory>,
    pub source: Arc<dyn FlowLogSource>,
    pub provisioner: Arc<dyn FlowLogProvisioner>,
}

impl Collaborators {
    pub fn from_config(config: &Config) -> Self {
        match &config.source {
            SourceConfig::Directory { root } => {
                info!("Reading flow logs from directory {}", root.display());
                let directory = Arc::new(DirectorySource::new(root, config.region.as_str()));
                Self {
                    inventory: directory.clone(),
                    source: directory.clone(),
                    provisioner: directory,
                }
            }
        }
    }
}

/// Entry point of the recording engine.
///
/// Resolves (and provisions when missing) the log group of every subnet,
/// then runs one `InterfaceSetWatcher` per subnet against a shared
/// `RecorderSupervisor` until shutdown is requested.
pub struct Controller {
    config: Config,
    collaborators: Collaborators,
}

impl Controller {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Binds every configured subnet to a log group.
    ///
    /// Subnets without flow logs get a `natwatch-<subnet>` group. Any failure,
    /// or a subnet still unbound afterwards, is fatal.
    pub async fn resolve_log_groups(&self) -> Result<Vec<LogGroupBinding>, ControllerError> {
        let provisioner = &self.collaborators.provisioner;
        let subnets = &self.config.subnets;

        let existing = provisioner
            .find_flow_log_groups(subnets)
            .await
            .map_err(ControllerError::ProvisioningFailed)?;
        let mut provisioned = false;
        for subnet in subnets.iter().filter(|s| !existing.contains_key(*s)) {
            let group = log_group_name(subnet);
            info!("Subnet {} has no flow log, provisioning {}", subnet, group);
            provisioner
                .ensure_log_group(&group)
                .await
                .map_err(ControllerError::ProvisioningFailed)?;
            provisioner
                .ensure_flow_log(subnet, &group)
                .await
                .map_err(ControllerError::ProvisioningFailed)?;
            provisioned = true;
        }

        let groups = if provisioned {
            provisioner
                .find_flow_log_groups(subnets)
                .await
                .map_err(ControllerError::ProvisioningFailed)?
        } else {
            existing
        };

        subnets
            .iter()
            .map(|subnet| match groups.get(subnet) {
                Some(group) => {
                    info!("Subnet {} flow logs in {}", subnet, group);
                    Ok(LogGroupBinding {
                        subnet_id: subnet.clone(),
                        log_group: group.clone(),
                    })
                }
                None => {
                    error!("Subnet {} is still not bound to a log group", subnet);
                    Err(ControllerError::MissingLogGroup(subnet.clone()))
                }
            })
            .collect()
    }

    /// Records until `shutdown` fires, then stops every watcher and recorder.
    pub async fn start_recording(
        &self,
        storage: Arc<dyn Storage>,
        shutdown: CancellationToken,
    ) -> Result<(), ControllerError> {
        let bindings = self.resolve_log_groups().await?;
        let settings = &self.config.recording;
        let mode = RecordingMode::from_live_flag(self.config.live_recording);

        let pool = WorkerPool::new(settings.worker_pool_size);
        let context = RecorderContext {
            source: self.collaborators.source.clone(),
            storage: storage.clone(),
            pool: pool.clone(),
            filter: Arc::new(AddressFilter::new(self.config.address_filters.clone())),
            settings: settings.clone(),
        };
        let supervisor = Arc::new(RecorderSupervisor::new(
            context,
            mode,
            settings.removal_grace(),
            shutdown.child_token(),
        ));

        info!(
            "Recording {} subnet(s) in {} ({:?}, {} worker slot(s))",
            bindings.len(),
            self.config.region,
            mode,
            settings.worker_pool_size
        );

        let mut watchers = JoinSet::new();
        for binding in &bindings {
            let watcher = InterfaceSetWatcher::new(
                &binding.subnet_id,
                &binding.log_group,
                self.collaborators.inventory.clone(),
                supervisor.clone(),
                storage.clone(),
                settings.discovery_interval(),
            );
            watchers.spawn(watcher.run(shutdown.clone()));
        }

        shutdown.cancelled().await;
        info!("Shutdown requested, stopping watchers");
        while let Some(joined) = watchers.join_next().await {
            if let Err(e) = joined {
                warn!("Watcher task failed: {}", e);
            }
        }
        pool.close();
        supervisor.shutdown_all().await;
        info!("Recording stopped");
        Ok(())
    }

    /// Summarizes the snapshot file of a previous run.
    pub fn analyze(&self) -> Result<TrafficSummary, ControllerError> {
        let path = &self.config.output.snapshots_path;
        let summary = analysis::analyze_file(path)?;
        info!(
            "{} interface(s) in {}",
            summary.interfaces,
            path.display()
        );
        match &summary.busiest_inbound {
            Some((id, bytes)) => info!("Max Inbound: {} with {} bytes", id, bytes),
            None => info!("Max Inbound: none"),
        }
        match &summary.busiest_outbound {
            Some((id, bytes)) => info!("Max Outbound: {} with {} bytes", id, bytes),
            None => info!("Max Outbound: none"),
        }
        Ok(summary)
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::SourceError;
    use crate::testing::MemoryStorage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir, extra: &str) -> Config {
        let toml = format!(
            r#"
subnets = ["subnet-1a", "subnet-2b"]
live_recording = true
{}
[recording]
discovery_interval_secs = 1
poll_interval_secs = 1
start_from_head = true
[output]
snapshots_path = "{}"
[source]
kind = "directory"
root = "{}"
"#,
            extra,
            dir.path().join("out/data.log").display(),
            dir.path().join("flows").display()
        );
        Config::from_toml_str(&toml).unwrap()
    }

    fn controller(config: Config) -> Controller {
        let collaborators = Collaborators::from_config(&config);
        Controller::new(config, collaborators)
    }

    #[tokio::test]
    async fn missing_bindings_are_provisioned() {
        let dir = TempDir::new().unwrap();
        let flows = dir.path().join("flows");
        fs::create_dir_all(flows.join("flow-logs")).unwrap();
        fs::write(flows.join("flow-logs/subnet-1a"), "existing-group\n").unwrap();

        let bindings = controller(config(&dir, "")).resolve_log_groups().await.unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].log_group, "existing-group");
        assert_eq!(bindings[1].subnet_id, "subnet-2b");
        assert_eq!(bindings[1].log_group, "natwatch-subnet-2b");
        assert!(flows.join("groups/natwatch-subnet-2b").is_dir());
    }

    struct StubbornProvisioner;

    #[async_trait]
    impl FlowLogProvisioner for StubbornProvisioner {
        async fn find_flow_log_groups(
            &self,
            _subnets: &[String],
        ) -> Result<HashMap<String, String>, SourceError> {
            Ok(HashMap::new())
        }

        async fn ensure_log_group(&self, _name: &str) -> Result<(), SourceError> {
            Ok(())
        }

        async fn ensure_flow_log(&self, _subnet_id: &str, _group: &str) -> Result<(), SourceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unbound_subnet_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, "");
        let mut collaborators = Collaborators::from_config(&config);
        collaborators.provisioner = Arc::new(StubbornProvisioner);
        let err = Controller::new(config, collaborators)
            .resolve_log_groups()
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::MissingLogGroup(ref s) if s == "subnet-1a"));
    }

    #[tokio::test]
    async fn records_from_directory_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let flows = dir.path().join("flows");
        fs::create_dir_all(flows.join("interfaces")).unwrap();
        fs::write(
            flows.join("interfaces/subnet-1a.json"),
            r#"[{"id":"eni-0abc"}]"#,
        )
        .unwrap();
        fs::write(flows.join("interfaces/subnet-2b.json"), "[]").unwrap();
        fs::create_dir_all(flows.join("groups/natwatch-subnet-1a")).unwrap();
        fs::write(
            flows.join("groups/natwatch-subnet-1a/eni-0abc-all"),
            "2 1 eni-0abc 10.0.0.7 52.1.1.1 50000 443 6 4 1200 1700000000 1700000060 ACCEPT OK\n\
             2 1 eni-0abc 52.1.1.1 10.0.0.7 443 50000 6 4 600 1700000000 1700000010 ACCEPT OK\n",
        )
        .unwrap();

        let controller = controller(config(&dir, r#"address_filters = ["10.0.0.0/24"]"#));
        let storage = Arc::new(MemoryStorage::new());
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        controller
            .start_recording(storage.clone(), shutdown)
            .await
            .unwrap();

        let snapshots = storage.snapshots();
        let last = snapshots.last().unwrap();
        assert_eq!(last.interface_id, "eni-0abc");
        assert_eq!(last.aggregate.total_bytes_out, 1200);
        assert_eq!(last.aggregate.max_bytes_per_min_out, 1200);
        assert_eq!(last.aggregate.total_bytes_in, 600);
        assert_eq!(last.aggregate.max_bytes_per_min_in, 3600);
        assert_eq!(storage.interfaces().len(), 1);
    }

    #[test]
    fn analyze_reads_snapshot_file() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, "");
        let path = &config.output.snapshots_path;
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            path,
            concat!(
                r#"{"interface_id":"eni-1","timestamp":"2024-01-01T00:00:00Z","min_bytes_per_min_in":1,"max_bytes_per_min_in":1,"total_bytes_in":10,"total_duration_sec_in":1,"min_bytes_per_min_out":1,"max_bytes_per_min_out":1,"total_bytes_out":99,"total_duration_sec_out":1}"#,
                "\n"
            ),
        )
        .unwrap();

        let summary = controller(config).analyze().unwrap();
        assert_eq!(summary.busiest_inbound, Some(("eni-1".to_string(), 10)));
        assert_eq!(summary.busiest_outbound, Some(("eni-1".to_string(), 99)));
    }
}
