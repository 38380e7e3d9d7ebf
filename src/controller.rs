pub mod actions;
pub mod controller_handler;

pub use actions::{Action, ActionRegistry};
pub use controller_handler::{wait_for_shutdown_signal, Collaborators, Controller};
