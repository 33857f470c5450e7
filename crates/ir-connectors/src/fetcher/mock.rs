//! Mock log source for testing.

use crate::traits::{
    ConnectorError, ConnectorResult, LogEntry, LogSource, Page, PageRequest, QueryWindow,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

const NEXT_LINK_PREFIX: &str = "mock://logs?page=";

enum Dataset {
    /// The same pages are served for every window.
    Pages(Vec<Vec<LogEntry>>),
    /// Timestamped events, filtered by window and split into fixed-size pages.
    Events {
        events: Vec<(DateTime<Utc>, LogEntry)>,
        page_size: usize,
    },
}

/// A scripted [`LogSource`] that records every request it receives.
pub struct MockLogSource {
    name: String,
    dataset: RwLock<Dataset>,
    current_window: RwLock<Option<QueryWindow>>,
    requests: RwLock<Vec<PageRequest>>,
    fail_at_page: RwLock<Option<usize>>,
    trailing_next_link: bool,
    looping_next_link: bool,
}

impl MockLogSource {
    fn from_dataset(dataset: Dataset) -> Self {
        Self {
            name: "mock-logs".to_string(),
            dataset: RwLock::new(dataset),
            current_window: RwLock::new(None),
            requests: RwLock::new(Vec::new()),
            fail_at_page: RwLock::new(None),
            trailing_next_link: false,
            looping_next_link: false,
        }
    }

    /// Serves `pages` for every window.
    pub fn with_pages(pages: Vec<Vec<LogEntry>>) -> Self {
        Self::from_dataset(Dataset::Pages(pages))
    }

    /// Serves the events whose timestamp falls in the requested window,
    /// `page_size` per page.
    pub fn with_events(events: Vec<(DateTime<Utc>, LogEntry)>, page_size: usize) -> Self {
        Self::from_dataset(Dataset::Events {
            events,
            page_size: page_size.max(1),
        })
    }

    /// The last page also carries a next link, which then yields an empty page.
    pub fn with_trailing_next_link(mut self) -> Self {
        self.trailing_next_link = true;
        self
    }

    /// The last page links to itself.
    pub fn with_looping_next_link(mut self) -> Self {
        self.looping_next_link = true;
        self
    }

    /// Replaces the pages served for subsequent windows.
    pub async fn set_pages(&self, pages: Vec<Vec<LogEntry>>) {
        *self.dataset.write().await = Dataset::Pages(pages);
    }

    /// Adds an event to an event-based dataset.
    pub async fn push_event(&self, at: DateTime<Utc>, entry: LogEntry) {
        if let Dataset::Events { events, .. } = &mut *self.dataset.write().await {
            events.push((at, entry));
        }
    }

    /// Makes the next request for page `index` (0-based) fail once.
    pub async fn fail_once_at_page(&self, index: usize) {
        *self.fail_at_page.write().await = Some(index);
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<PageRequest> {
        self.requests.read().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// The windows of all initial page requests, in order.
    pub async fn windows(&self) -> Vec<QueryWindow> {
        self.requests
            .read()
            .await
            .iter()
            .filter_map(|r| match r {
                PageRequest::Initial(window) => Some(window.clone()),
                PageRequest::Next(_) => None,
            })
            .collect()
    }

    async fn pages_for(&self, window: &QueryWindow) -> Vec<Vec<LogEntry>> {
        match &*self.dataset.read().await {
            Dataset::Pages(pages) => pages.clone(),
            Dataset::Events { events, page_size } => {
                let mut matching: Vec<_> = events
                    .iter()
                    .filter(|(at, _)| *at >= window.since && *at < window.until)
                    .collect();
                matching.sort_by_key(|(at, _)| *at);
                matching
                    .chunks(*page_size)
                    .map(|chunk| chunk.iter().map(|(_, e)| e.clone()).collect())
                    .collect()
            }
        }
    }

    fn next_link(&self, index: usize, page_count: usize) -> Option<String> {
        let last = page_count.saturating_sub(1);
        if self.looping_next_link && index == last {
            Some(format!("{}{}", NEXT_LINK_PREFIX, index))
        } else if index + 1 < page_count || (self.trailing_next_link && index == last) {
            Some(format!("{}{}", NEXT_LINK_PREFIX, index + 1))
        } else {
            None
        }
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn fetch_page(&self, request: &PageRequest) -> ConnectorResult<Page> {
        self.requests.write().await.push(request.clone());

        let index = match request {
            PageRequest::Initial(window) => {
                *self.current_window.write().await = Some(window.clone());
                0
            }
            PageRequest::Next(link) => link
                .strip_prefix(NEXT_LINK_PREFIX)
                .and_then(|i| i.parse::<usize>().ok())
                .ok_or_else(|| ConnectorError::InvalidRequest(format!("Unknown link {}", link)))?,
        };

        {
            let mut fail_at = self.fail_at_page.write().await;
            if *fail_at == Some(index) {
                *fail_at = None;
                return Err(ConnectorError::ConnectionFailed(format!(
                    "Simulated failure at page {}",
                    index
                )));
            }
        }

        let window = self
            .current_window
            .read()
            .await
            .clone()
            .ok_or_else(|| ConnectorError::InvalidRequest("Next link before first page".into()))?;
        let pages = self.pages_for(&window).await;

        Ok(Page {
            entries: pages.get(index).cloned().unwrap_or_default(),
            next: self.next_link(index, pages.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_entries;
    use chrono::{Duration, TimeZone};

    fn window(since: DateTime<Utc>, until: DateTime<Utc>) -> QueryWindow {
        QueryWindow {
            filter: String::new(),
            since,
            until,
        }
    }

    #[tokio::test]
    async fn test_pages_and_links() {
        let source = MockLogSource::with_pages(vec![sample_entries("a", 2), sample_entries("b", 1)]);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = source
            .fetch_page(&PageRequest::Initial(window(t, t + Duration::hours(1))))
            .await
            .unwrap();
        assert_eq!(first.entries.len(), 2);
        let next = first.next.unwrap();

        let second = source.fetch_page(&PageRequest::Next(next)).await.unwrap();
        assert_eq!(second.entries.len(), 1);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_events_are_filtered_by_window() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let source = MockLogSource::with_events(
            vec![
                (t, serde_json::json!(1)),
                (t + Duration::minutes(30), serde_json::json!(2)),
                (t + Duration::hours(1), serde_json::json!(3)),
            ],
            10,
        );

        let page = source
            .fetch_page(&PageRequest::Initial(window(t, t + Duration::hours(1))))
            .await
            .unwrap();
        assert_eq!(page.entries, vec![serde_json::json!(1), serde_json::json!(2)]);
    }

    #[tokio::test]
    async fn test_failure_is_one_shot() {
        let source = MockLogSource::with_pages(vec![sample_entries("a", 1)]);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = PageRequest::Initial(window(t, t + Duration::hours(1)));

        source.fail_once_at_page(0).await;
        assert!(source.fetch_page(&request).await.is_err());
        assert!(source.fetch_page(&request).await.is_ok());
        assert_eq!(source.request_count().await, 2);
    }
}
