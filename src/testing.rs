//! In-memory collaborators shared by the test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::discovery::types::NetworkInterface;
use crate::error_handling::types::{SourceError, StorageError};
use crate::flow_capture::types::{AggregateSnapshot, FlowRecord};
use crate::log_source::source_trait::{FlowLogSource, InterfaceInventory};
use crate::log_source::types::{EventPage, GetEventsRequest, LogEvent, LogStream, StreamPage};
use crate::storage::Storage;

/// A default-format flow-log line with the given endpoints and counters.
pub fn flow_line(src: &str, dst: &str, bytes: u64, start: u64, end: u64) -> String {
    format!(
        "2 123456789010 eni-test {} {} 443 50000 6 10 {} {} {} ACCEPT OK",
        src, dst, bytes, start, end
    )
}

type ScriptedPage = Result<EventPage, SourceError>;

/// Flow-log source answering `get_events` from a script.
///
/// Pages scripted for a specific stream are served first, then pages from the
/// shared queue. Once both are empty every call returns an empty page echoing
/// the request's token, i.e. the stream sits at its head.
#[derive(Default)]
pub struct ScriptedSource {
    streams: Mutex<Vec<String>>,
    shared: Mutex<VecDeque<ScriptedPage>>,
    per_stream: Mutex<HashMap<String, VecDeque<ScriptedPage>>>,
    requests: Mutex<Vec<GetEventsRequest>>,
}

fn page(messages: &[&str], token: Option<&str>) -> EventPage {
    EventPage {
        events: messages
            .iter()
            .map(|m| LogEvent {
                timestamp_ms: 0,
                ingestion_time_ms: 0,
                message: m.to_string(),
            })
            .collect(),
        next_forward_token: token.map(str::to_string),
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_streams(names: &[&str]) -> Self {
        let source = Self::new();
        source.set_streams(names);
        source
    }

    pub fn set_streams(&self, names: &[&str]) {
        *self.streams.lock().unwrap() = names.iter().map(|s| s.to_string()).collect();
    }

    pub fn push_page(&self, messages: &[&str], token: Option<&str>) {
        self.shared.lock().unwrap().push_back(Ok(page(messages, token)));
    }

    pub fn push_page_for(&self, stream: &str, messages: &[&str], token: Option<&str>) {
        self.per_stream
            .lock()
            .unwrap()
            .entry(stream.to_string())
            .or_default()
            .push_back(Ok(page(messages, token)));
    }

    pub fn push_failure(&self, error: SourceError) {
        self.shared.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<GetEventsRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn get_events_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested_tokens(&self) -> Vec<Option<String>> {
        self.requests().into_iter().map(|r| r.token).collect()
    }

    pub fn calls_for(&self, stream: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.stream == stream)
            .count()
    }
}

#[async_trait]
impl FlowLogSource for ScriptedSource {
    async fn list_streams(
        &self,
        _group: &str,
        prefix: &str,
        _page_token: Option<&str>,
    ) -> Result<StreamPage, SourceError> {
        let mut streams: Vec<LogStream> = self
            .streams
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| LogStream {
                name: name.clone(),
                created_ms: 0,
            })
            .collect();
        streams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(StreamPage {
            streams,
            next_token: None,
        })
    }

    async fn get_events(&self, request: &GetEventsRequest) -> Result<EventPage, SourceError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = self
            .per_stream
            .lock()
            .unwrap()
            .get_mut(&request.stream)
            .and_then(|q| q.pop_front());
        let scripted = match scripted {
            Some(s) => Some(s),
            None => self.shared.lock().unwrap().pop_front(),
        };
        match scripted {
            Some(result) => result,
            None => Ok(EventPage {
                events: Vec::new(),
                next_forward_token: request.token.clone(),
            }),
        }
    }
}

/// Inventory returning a settable list of interfaces per subnet.
#[derive(Default)]
pub struct StaticInventory {
    interfaces: Mutex<HashMap<String, Vec<NetworkInterface>>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, subnet_id: &str, ids: &[&str]) {
        let interfaces = ids
            .iter()
            .map(|id| NetworkInterface::new(*id, subnet_id))
            .collect();
        self.interfaces
            .lock()
            .unwrap()
            .insert(subnet_id.to_string(), interfaces);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InterfaceInventory for StaticInventory {
    async fn list_interfaces(
        &self,
        subnet_id: &str,
    ) -> Result<Vec<NetworkInterface>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Transient("inventory unavailable".to_string()));
        }
        Ok(self
            .interfaces
            .lock()
            .unwrap()
            .get(subnet_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Storage keeping everything in memory.
#[derive(Default)]
pub struct MemoryStorage {
    snapshots: Mutex<Vec<AggregateSnapshot>>,
    interfaces: Mutex<Vec<(NetworkInterface, DateTime<Utc>)>>,
    records: Mutex<Vec<FlowRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<AggregateSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn interfaces(&self) -> Vec<NetworkInterface> {
        self.interfaces
            .lock()
            .unwrap()
            .iter()
            .map(|(i, _)| i.clone())
            .collect()
    }

    pub fn records(&self) -> Vec<FlowRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Storage for MemoryStorage {
    fn save_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), StorageError> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    fn save_interface(
        &self,
        interface: &NetworkInterface,
        discovered_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.interfaces
            .lock()
            .unwrap()
            .push((interface.clone(), discovered_at));
        Ok(())
    }

    fn save_record(&self, record: &FlowRecord) -> Result<(), StorageError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
