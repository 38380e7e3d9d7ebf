pub mod configuration;
pub mod controller;
pub mod discovery;
pub mod error_handling;
pub mod flow_capture;
pub mod log_source;
pub mod recorder_management;
pub mod storage;

#[cfg(test)]
mod testing;
