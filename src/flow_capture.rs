//! Flow capture subsystem
//!
//! Turns a flow-log stream into per-interface NAT throughput statistics.
//!
//! Components:
//! - `parser`: fixed-layout flow-log line parser.
//! - `filter`: optional CIDR allow-list.
//! - `aggregator`: private/public classification and running aggregates.
//! - `worker_pool`: process-wide bound on concurrent tailing bursts.
//! - `tailer`: forward-token pagination of one stream.
//! - `recorder`: the per-interface task tying the above together.

pub mod aggregator;
pub mod filter;
pub mod parser;
pub mod recorder;
pub mod tailer;
pub mod types;
pub mod worker_pool;

pub use aggregator::ByteAggregator;
pub use filter::AddressFilter;
pub use parser::parse_flow_record;
pub use recorder::{RecorderContext, StreamCursor, StreamRecorder};
pub use tailer::{BurstOutcome, BurstRequest, StreamTailer};
pub use types::{AggregateSnapshot, Direction, FlowRecord, InterfaceAggregate};
pub use worker_pool::{WorkerPool, WorkerSlot};
