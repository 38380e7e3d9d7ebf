use std::fmt;
use std::net::IpAddr;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    SubnetsEmpty(String),
    BadSubnetId(String),
    BadCidr(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::SubnetsEmpty(e) => write!(f, "Subnets configuration error: {}", e),
            ConfigError::BadSubnetId(e) => write!(f, "Subnet id error: {}", e),
            ConfigError::BadCidr(e) => write!(f, "CIDR formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// A flow-log line that does not follow the fixed 14-field layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    FieldCount { expected: usize, found: usize },
    InvalidNumber { field: &'static str, value: String },
    InvalidAddress { field: &'static str, value: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::FieldCount { expected, found } => {
                write!(f, "expected {} fields but found {}", expected, found)
            }
            ParseError::InvalidNumber { field, value } => {
                write!(f, "field '{}' is not a number: '{}'", field, value)
            }
            ParseError::InvalidAddress { field, value } => {
                write!(f, "field '{}' is not an IP address: '{}'", field, value)
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    PublicToPublic { src: IpAddr, dst: IpAddr },
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationError::PublicToPublic { src, dst } => {
                write!(f, "public-to-public unsupported: {} -> {}", src, dst)
            }
        }
    }
}

impl std::error::Error for ClassificationError {}

/// Failure of a call against an external collaborator (inventory, log source, provisioner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    Transient(String),
    NotFound(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transient(e) => write!(f, "Transient source error: {}", e),
            SourceError::NotFound(e) => write!(f, "Resource not found: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(err.to_string()),
            _ => SourceError::Transient(err.to_string()),
        }
    }
}

/// Failure of one tailing burst. Never fatal to the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailError {
    Source(SourceError),
    Protocol { stream: String, events: usize },
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailError::Source(e) => write!(f, "Tail source error: {}", e),
            TailError::Protocol { stream, events } => write!(
                f,
                "Protocol error: page of {} event(s) without a forward token for stream {}",
                events, stream
            ),
        }
    }
}

impl std::error::Error for TailError {}

impl From<SourceError> for TailError {
    fn from(err: SourceError) -> Self {
        TailError::Source(err)
    }
}

/// Reasons a per-interface recorder gives up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    StreamNotFound { interface_id: String },
    AmbiguousStream { interface_id: String, count: usize },
    Source(SourceError),
    PoolClosed,
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderError::StreamNotFound { interface_id } => write!(
                f,
                "no log stream found by interface prefix '{}'",
                interface_id
            ),
            RecorderError::AmbiguousStream {
                interface_id,
                count,
            } => write!(
                f,
                "expected to find single stream by interface prefix '{}' but found {}",
                interface_id, count
            ),
            RecorderError::Source(e) => write!(f, "Recorder source error: {}", e),
            RecorderError::PoolClosed => write!(f, "Worker pool closed"),
        }
    }
}

impl std::error::Error for RecorderError {}

impl From<SourceError> for RecorderError {
    fn from(err: SourceError) -> Self {
        RecorderError::Source(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    WriteFailed,
    ReadFailed,
    Corrupted(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::Corrupted(e) => write!(f, "Storage content corrupted: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum ControllerError {
    MissingLogGroup(String),
    ProvisioningFailed(SourceError),
    StorageError(StorageError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::MissingLogGroup(subnet) => {
                write!(f, "No flow log group bound to subnet {}", subnet)
            }
            ControllerError::ProvisioningFailed(e) => write!(f, "Provisioning failed: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

#[derive(Debug)]
pub enum ActionError {
    AlreadyRegistered(String),
    NotRegistered(String),
    Failed(ControllerError),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::AlreadyRegistered(name) => {
                write!(f, "Action '{}' is already registered", name)
            }
            ActionError::NotRegistered(name) => write!(f, "Action '{}' not found", name),
            ActionError::Failed(e) => write!(f, "Action failed: {}", e),
        }
    }
}

impl std::error::Error for ActionError {}
