//! Forward-token tailing of one log stream.
//!
//! A burst drains every event currently available after a cursor. The first
//! page fetched without a token is always re-polled once with the token it
//! returned, two consecutive equal tokens mean the stream is at its head.

use log::trace;
use std::sync::Arc;

use crate::error_handling::types::TailError;
use crate::log_source::source_trait::FlowLogSource;
use crate::log_source::types::{GetEventsRequest, LogEvent};

/// Where a burst starts.
#[derive(Debug, Clone)]
pub struct BurstRequest {
    pub group: String,
    pub stream: String,
    pub token: Option<String>,
    /// Only applied while `token` is absent.
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstOutcome {
    /// Token to resume from. `None` only when the stream never returned one.
    pub next_token: Option<String>,
    pub pages: usize,
    pub events: usize,
}

pub struct StreamTailer {
    source: Arc<dyn FlowLogSource>,
    page_limit: usize,
}

impl StreamTailer {
    pub fn new(source: Arc<dyn FlowLogSource>, page_limit: usize) -> Self {
        Self { source, page_limit }
    }

    /// Runs one burst, handing every event to `on_event` in source order.
    ///
    /// Events already delivered before an error are not rolled back; the
    /// caller retries from the request's original token.
    pub async fn burst<F>(
        &self,
        request: &BurstRequest,
        mut on_event: F,
    ) -> Result<BurstOutcome, TailError>
    where
        F: FnMut(&LogEvent),
    {
        let mut current = request.token.clone();
        let mut pages = 0;
        let mut events = 0;

        loop {
            let page = self
                .source
                .get_events(&GetEventsRequest {
                    group: request.group.clone(),
                    stream: request.stream.clone(),
                    token: current.clone(),
                    start_time_ms: request.start_time_ms,
                    end_time_ms: request.end_time_ms,
                    limit: self.page_limit,
                })
                .await?;
            pages += 1;
            events += page.events.len();
            for event in &page.events {
                on_event(event);
            }

            let next = match page.next_forward_token {
                Some(next) => next,
                None if page.events.is_empty() => {
                    return Ok(BurstOutcome {
                        next_token: current,
                        pages,
                        events,
                    })
                }
                None => {
                    return Err(TailError::Protocol {
                        stream: request.stream.clone(),
                        events: page.events.len(),
                    })
                }
            };

            match current {
                Some(ref token) if *token == next => {
                    trace!("{} caught up at {}", request.stream, next);
                    return Ok(BurstOutcome {
                        next_token: Some(next),
                        pages,
                        events,
                    });
                }
                _ => current = Some(next),
            }
        }
    }
}
