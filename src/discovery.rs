pub mod interface_watcher;
pub mod types;

pub use interface_watcher::InterfaceSetWatcher;
pub use types::{diff_interfaces, InterfaceDiff, NetworkInterface};
