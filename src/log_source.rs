pub mod local_directory;
pub mod source_trait;
pub mod types;

pub use local_directory::DirectorySource;
pub use source_trait::{list_all_streams, FlowLogProvisioner, FlowLogSource, InterfaceInventory};
pub use types::{EventPage, GetEventsRequest, LogEvent, LogGroupBinding, LogStream, StreamPage};
