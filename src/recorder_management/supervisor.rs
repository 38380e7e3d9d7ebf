use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::tracked_interface::{RecorderHandle, TrackedInterface, TrackingState};
use crate::flow_capture::recorder::{RecorderContext, StreamRecorder};

type TrackedMap = HashMap<String, TrackedInterface>;

/// Whether discovered interfaces get a recorder or are only tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    Live,
    Passive,
}

impl RecordingMode {
    pub fn from_live_flag(live: bool) -> Self {
        if live {
            RecordingMode::Live
        } else {
            RecordingMode::Passive
        }
    }
}

/// The structure related to recorder management
///
/// Owns the map of tracked interfaces and the recorder task of each one.
/// The map is shared with the completion callback of every recorder task,
/// hence the mutex; it is never held across an await point.
///
/// # Fields Overview
///
/// - `tracked`: interface ID to tracking entry, at most one entry per ID
/// - `context`: shared recorder dependencies (source, storage, pool, filter)
/// - `mode`: live recording or membership tracking only
/// - `grace`: how long `on_removed` waits for a cancelled recorder to exit
/// - `shutdown`: parent of every recorder's cancellation token
pub struct RecorderSupervisor {
    tracked: Arc<Mutex<TrackedMap>>,
    context: RecorderContext,
    mode: RecordingMode,
    grace: Duration,
    shutdown: CancellationToken,
}

fn lock(tracked: &Mutex<TrackedMap>) -> MutexGuard<'_, TrackedMap> {
    tracked.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecorderSupervisor {
    pub fn new(
        context: RecorderContext,
        mode: RecordingMode,
        grace: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tracked: Arc::new(Mutex::new(HashMap::new())),
            context,
            mode,
            grace,
            shutdown,
        }
    }

    /// Starts tracking `interface_id`, spawning its recorder in live mode.
    ///
    /// Returns `false` when the interface is already tracked, including while
    /// a previous recorder for it is still being stopped.
    pub fn on_added(&self, interface_id: &str, subnet_id: &str, log_group: &str) -> bool {
        let mut tracked = lock(&self.tracked);
        if tracked.contains_key(interface_id) {
            debug!("[{}] Already tracked", interface_id);
            return false;
        }

        let recorder = match self.mode {
            RecordingMode::Live => Some(self.spawn_recorder(interface_id, log_group)),
            RecordingMode::Passive => None,
        };
        tracked.insert(
            interface_id.to_string(),
            TrackedInterface::new(interface_id, subnet_id, recorder),
        );
        info!(
            "[{}] Tracking started in {} ({:?})",
            interface_id, subnet_id, self.mode
        );
        true
    }

    // Called with the map locked: the completion callback cannot observe the
    // map before the new entry is inserted.
    fn spawn_recorder(&self, interface_id: &str, log_group: &str) -> RecorderHandle {
        let recorder_id = Uuid::new_v4();
        let cancel = self.shutdown.child_token();
        let recorder = StreamRecorder::new(self.context.clone(), interface_id, log_group);
        let tracked = Arc::clone(&self.tracked);
        let id = interface_id.to_string();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            match recorder.run(token).await {
                Ok(()) => debug!("[{}] Recorder {} finished", id, recorder_id),
                Err(e) => {
                    error!("[{}] Recorder exited: {}", id, e);
                    release_own_entry(&tracked, &id, recorder_id);
                }
            }
        });

        RecorderHandle {
            recorder_id,
            cancel,
            task: Some(task),
        }
    }

    /// Stops tracking `interface_id`.
    ///
    /// Signals cancellation, then joins the recorder for at most the grace
    /// period and aborts it if it is still running. The entry stays in the
    /// map (as `Stopping`) until the recorder is gone, so once this returns
    /// the interface is untracked and has no running recorder.
    pub async fn on_removed(&self, interface_id: &str) -> bool {
        let task = {
            let mut tracked = lock(&self.tracked);
            match tracked.get_mut(interface_id) {
                None => return false,
                Some(entry) if entry.state == TrackingState::Stopping => return false,
                Some(entry) => entry.begin_stop(),
            }
        };

        if let Some(mut task) = task {
            match tokio::time::timeout(self.grace, &mut task).await {
                Ok(_) => debug!("[{}] Recorder joined", interface_id),
                Err(_) => {
                    warn!(
                        "[{}] Recorder still running after {:?}, aborting",
                        interface_id, self.grace
                    );
                    task.abort();
                }
            }
        }

        let mut tracked = lock(&self.tracked);
        if tracked
            .get(interface_id)
            .map_or(false, |e| e.state == TrackingState::Stopping)
        {
            tracked.remove(interface_id);
        }
        info!("[{}] Tracking stopped", interface_id);
        true
    }

    /// Cancels every recorder and waits for all of them.
    pub async fn shutdown_all(&self) {
        self.shutdown.cancel();
        let ids: Vec<String> = lock(&self.tracked).keys().cloned().collect();
        info!("Stopping {} tracked interface(s)", ids.len());
        for id in ids {
            self.on_removed(&id).await;
        }
    }

    /// Sorted IDs tracked for `subnet_id`.
    pub fn tracked_ids(&self, subnet_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.tracked)
            .values()
            .filter(|e| e.subnet_id == subnet_id)
            .map(|e| e.interface_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn tracked_count(&self) -> usize {
        lock(&self.tracked).len()
    }

    pub fn is_tracked(&self, interface_id: &str) -> bool {
        lock(&self.tracked).contains_key(interface_id)
    }

    pub fn has_active_recorder(&self, interface_id: &str) -> bool {
        lock(&self.tracked)
            .get(interface_id)
            .map_or(false, |e| e.has_active_recorder())
    }
}

/// Drops the entry of a recorder that gave up on its own, so the next
/// discovery cycle starts a fresh one. Entries belonging to another recorder
/// or already being stopped are left alone.
fn release_own_entry(tracked: &Mutex<TrackedMap>, interface_id: &str, recorder_id: Uuid) {
    let mut tracked = lock(tracked);
    let owned = tracked.get(interface_id).map_or(false, |e| {
        e.state == TrackingState::Running && e.recorder_id() == Some(recorder_id)
    });
    if owned {
        tracked.remove(interface_id);
        info!("[{}] Released for retry on next discovery", interface_id);
    }
}
