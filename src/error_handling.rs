//! Error types shared by every natwatch subsystem.

pub mod types;
