pub mod supervisor;
pub mod tracked_interface;


pub use supervisor::{RecorderSupervisor, RecordingMode};
pub use tracked_interface::{RecorderHandle, TrackedInterface, TrackingState};
