//! Incremental audit log fetching.
//!
//! Each call to [`IncrementalFetcher::fetch`] is one polling tick:
//!
//! 1. load the [`Checkpoint`] (watermark + backlog),
//! 2. if the backlog is empty, page through `[last_run_time, now)` and make
//!    the result the new backlog, advancing the watermark to `now`,
//! 3. release at most `fetch_limit` entries from the front of the backlog,
//! 4. save the rest.
//!
//! A failed page aborts the tick before anything is saved, so the next tick
//! retries the same window from scratch.

pub mod checkpoint;
pub mod mock;
pub mod timestamp;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};

use crate::traits::{
    ConnectorError, ConnectorResult, LogEntry, LogSource, PageRequest, QueryWindow,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Default upper bound on pages followed within one window.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Window start used when no checkpoint exists yet.
    pub first_fetch: DateTime<Utc>,
    /// Pages followed per window before the fetch is abandoned.
    pub max_pages: usize,
}

impl FetcherConfig {
    pub fn new(first_fetch: DateTime<Utc>) -> Self {
        Self {
            first_fetch: timestamp::truncate(first_fetch),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// A log entry handed to the host for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// The entry serialized as a JSON string.
    #[serde(rename = "rawJSON")]
    pub raw_json: String,
}

impl Incident {
    pub fn from_entry(entry: &LogEntry) -> ConnectorResult<Self> {
        serde_json::to_string(entry)
            .map(|raw_json| Self { raw_json })
            .map_err(|e| ConnectorError::Internal(format!("Failed to serialize entry: {}", e)))
    }
}

/// Follows a window's pagination to the end and returns every entry in page order.
///
/// Stops at the first page without a next link or without entries. A next
/// link already seen in this window, or more than `max_pages` pages, is an
/// error.
pub async fn collect_window(
    source: &dyn LogSource,
    window: &QueryWindow,
    max_pages: usize,
) -> ConnectorResult<Vec<LogEntry>> {
    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    let mut request = PageRequest::Initial(window.clone());

    for page_number in 1..=max_pages {
        let page = source.fetch_page(&request).await?;
        debug!(
            page = page_number,
            entries = page.entries.len(),
            has_next = page.next.is_some(),
            "Received log page"
        );

        if page.entries.is_empty() {
            return Ok(entries);
        }
        entries.extend(page.entries);

        match page.next {
            None => return Ok(entries),
            Some(next) => {
                if !visited.insert(next.clone()) {
                    return Err(ConnectorError::PaginationLoop(next));
                }
                request = PageRequest::Next(next);
            }
        }
    }

    Err(ConnectorError::PaginationExceeded(max_pages))
}

/// Releases log entries in bounded batches, carrying the backlog and the
/// time watermark across invocations.
pub struct IncrementalFetcher {
    source: Arc<dyn LogSource>,
    store: Arc<dyn CheckpointStore>,
    config: FetcherConfig,
    clock: Arc<dyn Clock>,
}

impl IncrementalFetcher {
    pub fn new(
        source: Arc<dyn LogSource>,
        store: Arc<dyn CheckpointStore>,
        config: FetcherConfig,
    ) -> Self {
        Self::with_clock(source, store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn LogSource>,
        store: Arc<dyn CheckpointStore>,
        config: FetcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            store,
            config,
            clock,
        }
    }

    /// Runs one tick and returns at most `fetch_limit` entries, oldest first.
    #[instrument(skip(self), fields(source = %self.source.source_name()))]
    pub async fn fetch(&self, filter: &str, fetch_limit: usize) -> ConnectorResult<Vec<LogEntry>> {
        let (mut last_run_time, mut pending) = match self.store.load().await? {
            Some(checkpoint) => (checkpoint.last_run_time, checkpoint.pending_entries),
            None => (self.config.first_fetch, Vec::new()),
        };

        // Never move the watermark backwards, even if the clock does.
        let until = timestamp::truncate(self.clock.now()).max(last_run_time);

        if pending.is_empty() {
            let window = QueryWindow {
                filter: filter.to_string(),
                since: last_run_time,
                until,
            };
            debug!(
                "Fetching logs from {} to {}",
                timestamp::format(&window.since),
                timestamp::format(&window.until)
            );

            pending = collect_window(self.source.as_ref(), &window, self.config.max_pages)
                .await
                .map_err(|e| {
                    error!(
                        "Failed to fetch log events from {} to {}: {}",
                        timestamp::format(&window.since),
                        timestamp::format(&window.until),
                        e
                    );
                    e
                })?;
            last_run_time = until;
        } else {
            debug!(backlog = pending.len(), "Serving backlog, remote fetch skipped");
        }

        let remaining = pending.split_off(fetch_limit.min(pending.len()));
        self.store
            .save(&Checkpoint {
                last_run_time,
                pending_entries: remaining,
            })
            .await?;

        info!(
            released = pending.len(),
            watermark = %timestamp::format(&last_run_time),
            "Fetch tick complete"
        );
        Ok(pending)
    }

    /// Runs one tick and wraps the released entries as incidents.
    pub async fn fetch_incidents(
        &self,
        filter: &str,
        fetch_limit: usize,
    ) -> ConnectorResult<Vec<Incident>> {
        self.fetch(filter, fetch_limit)
            .await?
            .iter()
            .map(Incident::from_entry)
            .collect()
    }
}
