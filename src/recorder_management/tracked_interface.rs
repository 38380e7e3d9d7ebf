use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle of a tracked interface inside the supervisor's map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Running,
    /// Cancellation was signalled and the recorder is being joined.
    Stopping,
}

/// Handle on a spawned recorder task.
///
/// `recorder_id` tells apart two recorders started for the same interface
/// ID over time, so a finishing task only ever cleans up its own entry.
#[derive(Debug)]
pub struct RecorderHandle {
    pub recorder_id: Uuid,
    pub cancel: CancellationToken,
    pub task: Option<JoinHandle<()>>,
}

impl RecorderHandle {
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// Represents an interface the supervisor currently tracks.
///
/// In passive mode `recorder` is `None`: the interface is tracked for
/// visibility only.
#[derive(Debug)]
pub struct TrackedInterface {
    pub interface_id: String,
    pub subnet_id: String,
    pub started_at: DateTime<Utc>,
    pub state: TrackingState,
    pub recorder: Option<RecorderHandle>,
}

impl TrackedInterface {
    pub fn new(interface_id: &str, subnet_id: &str, recorder: Option<RecorderHandle>) -> Self {
        Self {
            interface_id: interface_id.to_string(),
            subnet_id: subnet_id.to_string(),
            started_at: Utc::now(),
            state: TrackingState::Running,
            recorder,
        }
    }

    pub fn recorder_id(&self) -> Option<Uuid> {
        self.recorder.as_ref().map(|r| r.recorder_id)
    }

    pub fn has_active_recorder(&self) -> bool {
        self.recorder.as_ref().map_or(false, |r| !r.is_finished())
    }

    /// Marks the entry as stopping, signals cancellation and hands back the
    /// task to join. Returns `None` when there is nothing to join.
    pub fn begin_stop(&mut self) -> Option<JoinHandle<()>> {
        self.state = TrackingState::Stopping;
        let recorder = self.recorder.as_mut()?;
        recorder.cancel.cancel();
        recorder.task.take()
    }
}
