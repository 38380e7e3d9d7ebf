//! Per-interface flow-log recorder.
//!
//! A `StreamRecorder` follows a single interface's flow-log stream for as
//! long as the interface is tracked:
//!
//! 1. Locating: find the one stream of the bound log group whose name starts
//!    with the interface ID. Zero or several matches end the recorder.
//! 2. Polling: take a worker-pool slot, drain the stream with one tailing
//!    burst, give the slot back, wait for the poll interval (or the retry
//!    backoff after a failed burst) and start over.
//!
//! Every event of a burst is parsed, filtered and folded into the interface's
//! `ByteAggregator`; each change of the aggregate is persisted as a snapshot
//! through the injected `Storage`. Record-level failures are logged and
//! skipped, burst-level failures are retried from the same forward token.
//!
//! Cancellation is cooperative: the token is raced against pool admission,
//! the burst itself and the inter-burst wait, so a cancelled recorder never
//! waits for nor keeps a pool slot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use tokio_util::sync::CancellationToken;

use super::aggregator::ByteAggregator;
use super::filter::AddressFilter;
use super::parser::parse_flow_record;
use super::tailer::{BurstOutcome, BurstRequest, StreamTailer};
use super::types::AggregateSnapshot;
use super::worker_pool::WorkerPool;
use crate::configuration::types::RecordingSettings;
use crate::error_handling::types::{RecorderError, TailError};
use crate::log_source::source_trait::{list_all_streams, FlowLogSource};
use crate::log_source::types::LogEvent;
use crate::storage::Storage;

/// Everything a recorder shares with its siblings.
#[derive(Clone)]
pub struct RecorderContext {
    pub source: Arc<dyn FlowLogSource>,
    pub storage: Arc<dyn Storage>,
    pub pool: WorkerPool,
    pub filter: Arc<AddressFilter>,
    pub settings: RecordingSettings,
}

/// Read position of one recorder. Never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamCursor {
    pub next_forward_token: Option<String>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl StreamCursor {
    fn advance(&mut self, outcome: &BurstOutcome) {
        if outcome.next_token.is_some() {
            self.next_forward_token = outcome.next_token.clone();
        }
        self.last_polled_at = Some(Utc::now());
    }
}

pub struct StreamRecorder {
    context: RecorderContext,
    interface_id: String,
    log_group: String,
    tailer: StreamTailer,
    cursor: StreamCursor,
    aggregator: ByteAggregator,
}

impl StreamRecorder {
    pub fn new(context: RecorderContext, interface_id: &str, log_group: &str) -> Self {
        let tailer = StreamTailer::new(
            context.source.clone(),
            context.settings.events_page_limit,
        );
        Self {
            context,
            interface_id: interface_id.to_string(),
            log_group: log_group.to_string(),
            tailer,
            cursor: StreamCursor::default(),
            aggregator: ByteAggregator::new(interface_id),
        }
    }

    /// Finds the interface's stream inside the bound log group.
    pub async fn locate_stream(&self) -> Result<String, RecorderError> {
        let mut streams = list_all_streams(
            self.context.source.as_ref(),
            &self.log_group,
            &self.interface_id,
        )
        .await?;
        streams.retain(|s| s.name.starts_with(&self.interface_id));
        match streams.len() {
            0 => Err(RecorderError::StreamNotFound {
                interface_id: self.interface_id.clone(),
            }),
            1 => Ok(streams.remove(0).name),
            count => Err(RecorderError::AmbiguousStream {
                interface_id: self.interface_id.clone(),
                count,
            }),
        }
    }

    /// Records until `cancel` fires. Returns an error only when the stream
    /// cannot be located or the worker pool is closed.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), RecorderError> {
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            located = self.locate_stream() => located?,
        };
        info!("[{}] Recording stream {} of {}", self.interface_id, stream, self.log_group);

        let start_floor = if self.context.settings.start_from_head {
            None
        } else {
            Some(Utc::now().timestamp_millis())
        };

        loop {
            let slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                slot = self.context.pool.acquire() => slot?,
            };
            trace!(
                "[{}] Acquired worker slot, {} left",
                self.interface_id,
                self.context.pool.available()
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.burst(&stream, start_floor) => result,
            };
            drop(slot);

            let wait = match result {
                Ok(outcome) => {
                    debug!(
                        "[{}] Burst done: {} event(s) over {} page(s)",
                        self.interface_id, outcome.events, outcome.pages
                    );
                    self.cursor.advance(&outcome);
                    self.context.settings.poll_interval()
                }
                Err(e) => {
                    warn!(
                        "[{}] Burst failed, retrying from the same token: {}",
                        self.interface_id, e
                    );
                    self.context.settings.retry_backoff()
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("[{}] Recorder stopped", self.interface_id);
        Ok(())
    }

    async fn burst(
        &mut self,
        stream: &str,
        start_floor: Option<i64>,
    ) -> Result<BurstOutcome, TailError> {
        let token = self.cursor.next_forward_token.clone();
        let request = BurstRequest {
            group: self.log_group.clone(),
            stream: stream.to_string(),
            start_time_ms: if token.is_none() { start_floor } else { None },
            end_time_ms: None,
            token,
        };

        let interface_id = &self.interface_id;
        let context = &self.context;
        let aggregator = &mut self.aggregator;
        self.tailer
            .burst(&request, |event| {
                handle_event(interface_id, context, aggregator, event)
            })
            .await
    }
}

fn handle_event(
    interface_id: &str,
    context: &RecorderContext,
    aggregator: &mut ByteAggregator,
    event: &LogEvent,
) {
    let record = match parse_flow_record(&event.message) {
        Ok(r) => r,
        Err(e) => {
            warn!("[{}] Skipping malformed record: {}", interface_id, e);
            return;
        }
    };
    if record.is_heartbeat() {
        trace!("[{}] Heartbeat {}", interface_id, record.log_status);
        return;
    }
    if !context.filter.accepts(&record) {
        debug!("[{}] Record filtered out", interface_id);
        return;
    }
    if let Err(e) = context.storage.save_record(&record) {
        warn!("[{}] Failed to echo record: {}", interface_id, e);
    }

    match aggregator.observe(&record) {
        Ok(Some(snapshot)) => {
            log_snapshot(&snapshot);
            if let Err(e) = context.storage.save_snapshot(&snapshot) {
                warn!("[{}] Failed to persist snapshot: {}", interface_id, e);
            }
        }
        Ok(None) => {}
        Err(e) => warn!("[{}] {}", interface_id, e),
    }
}

fn log_snapshot(snapshot: &AggregateSnapshot) {
    let a = &snapshot.aggregate;
    info!(
        "[{}] in: {} B over {}s (max {} B/min) out: {} B over {}s (max {} B/min)",
        snapshot.interface_id,
        a.total_bytes_in,
        a.total_duration_sec_in,
        a.max_bytes_per_min_in,
        a.total_bytes_out,
        a.total_duration_sec_out,
        a.max_bytes_per_min_out
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::SourceError;
    use crate::testing::{flow_line, MemoryStorage, ScriptedSource};
    use std::time::Duration;

    fn context(source: Arc<ScriptedSource>, storage: Arc<MemoryStorage>) -> RecorderContext {
        RecorderContext {
            source,
            storage,
            pool: WorkerPool::new(1),
            filter: Arc::new(AddressFilter::default()),
            settings: RecordingSettings::default(),
        }
    }

    #[tokio::test]
    async fn missing_stream_is_reported() {
        let source = Arc::new(ScriptedSource::new());
        let recorder =
            StreamRecorder::new(context(source, Arc::new(MemoryStorage::new())), "eni-1", "g");
        let err = recorder.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RecorderError::StreamNotFound { .. }));
    }

    #[tokio::test]
    async fn several_streams_are_ambiguous() {
        let source = Arc::new(ScriptedSource::with_streams(&["eni-1-a", "eni-1-b", "eni-2-a"]));
        let recorder =
            StreamRecorder::new(context(source, Arc::new(MemoryStorage::new())), "eni-1", "g");
        let err = recorder.locate_stream().await.unwrap_err();
        assert_eq!(
            err,
            RecorderError::AmbiguousStream {
                interface_id: "eni-1".to_string(),
                count: 2
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn records_snapshots_and_skips_bad_lines() {
        let source = Arc::new(ScriptedSource::with_streams(&["eni-1-all"]));
        let lines = [
            flow_line("52.1.1.1", "10.0.0.5", 1000, 100, 110),
            "garbage".to_string(),
            "2 1 eni-1 - - - - - - - 100 110 - NODATA".to_string(),
            flow_line("8.8.8.8", "1.1.1.1", 5, 100, 110),
            flow_line("10.0.0.5", "10.0.0.6", 5, 100, 110),
        ];
        let messages: Vec<&str> = lines.iter().map(String::as_str).collect();
        source.push_page(&messages, Some("A"));
        let storage = Arc::new(MemoryStorage::new());
        let recorder = StreamRecorder::new(context(source.clone(), storage.clone()), "eni-1", "g");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(recorder.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        assert!(task.await.unwrap().is_ok());

        let snapshots = storage.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].aggregate.total_bytes_in, 1000);
        assert_eq!(storage.records().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_burst_is_retried_from_same_token() {
        let source = Arc::new(ScriptedSource::with_streams(&["eni-1-all"]));
        source.push_page(&[], Some("A"));
        source.push_page(&[], Some("A"));
        source.push_failure(SourceError::Transient("throttled".to_string()));
        let storage = Arc::new(MemoryStorage::new());
        let recorder = StreamRecorder::new(context(source.clone(), storage), "eni-1", "g");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(recorder.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(12)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();

        let tokens = source.requested_tokens();
        assert_eq!(tokens[0], None);
        assert!(tokens[1..].iter().all(|t| t.as_deref() == Some("A")));
        assert!(tokens.len() >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn events_without_token_are_retried_after_backoff() {
        let source = Arc::new(ScriptedSource::with_streams(&["eni-1-all"]));
        source.push_page(&[], Some("A"));
        source.push_page(&[], Some("A"));
        source.push_page(&["m"], None);
        let storage = Arc::new(MemoryStorage::new());
        let recorder = StreamRecorder::new(context(source.clone(), storage), "eni-1", "g");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(recorder.run(cancel.clone()));

        // Head reached at 0s, broken page at 5s, retry waits the backoff.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(source.get_events_calls(), 3);

        tokio::time::sleep(Duration::from_secs(4)).await;
        let tokens = source.requested_tokens();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], None);
        assert!(tokens[1..].iter().all(|t| t.as_deref() == Some("A")));
        assert!(!task.is_finished());

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn first_burst_starts_from_now() {
        let source = Arc::new(ScriptedSource::with_streams(&["eni-1-all"]));
        let storage = Arc::new(MemoryStorage::new());
        let recorder = StreamRecorder::new(context(source.clone(), storage), "eni-1", "g");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(recorder.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();

        let first = source.requests().remove(0);
        assert!(first.start_time_ms.is_some());
        assert_eq!(first.limit, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_recorder_does_not_wait_for_a_slot() {
        let source = Arc::new(ScriptedSource::with_streams(&["eni-1-all"]));
        let ctx = context(source.clone(), Arc::new(MemoryStorage::new()));
        let _held = ctx.pool.acquire().await.unwrap();
        let recorder = StreamRecorder::new(ctx, "eni-1", "g");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(recorder.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(source.get_events_calls(), 0);
    }
}
