//! Storage subsystem
//!
//! Persistence of everything the recorder produces.
//!
//! Components:
//! - `storage_trait`: the Storage trait every component writes through.
//! - `file_storage`: JSON-lines file backend.
//! - `analysis`: offline summary of a finished run's snapshot file.

pub mod analysis;
pub mod file_storage;
pub mod storage_trait;

pub use file_storage::FileStorage;
pub use storage_trait::Storage;
