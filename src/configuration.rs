pub mod config;
pub mod types;

pub use config::{CliArgs, Config};
pub use types::{parse_cidr, OutputSettings, RecordingSettings, SourceConfig};
