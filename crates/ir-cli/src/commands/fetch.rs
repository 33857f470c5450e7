//! Fetch command - runs one incremental fetch tick.

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::sync::Arc;
use tracing::Instrument;

use ir_connectors::{FetcherConfig, FileCheckpointStore, Incident, IncrementalFetcher, LogSource};

use crate::config::AppConfig;
use crate::OutputFormat;

/// Builds a fetcher over `source` that keeps its checkpoint at the configured path.
pub fn build_fetcher(config: &AppConfig, source: Arc<dyn LogSource>) -> Result<IncrementalFetcher> {
    let first_fetch = config.fetch.first_fetch_time(Utc::now())?;
    let store = FileCheckpointStore::new(&config.fetch.checkpoint_path);
    Ok(IncrementalFetcher::new(
        source,
        Arc::new(store),
        FetcherConfig::new(first_fetch).with_max_pages(config.fetch.max_pages),
    ))
}

/// Runs one tick and returns the released incidents.
pub async fn fetch_once(config: &AppConfig, source: Arc<dyn LogSource>) -> Result<Vec<Incident>> {
    let span = ir_observability::fetch_span!(source.source_name(), limit = config.fetch.max_fetch);
    let fetcher = build_fetcher(config, source)?;
    fetcher
        .fetch_incidents(&config.fetch.query_filter, config.fetch.max_fetch)
        .instrument(span)
        .await
        .context("Failed to fetch log events")
}

pub async fn run_fetch(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let connector = Arc::new(super::connect(config)?);
    let incidents = fetch_once(config, connector).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&incidents)?);
        return Ok(());
    }

    println!("{} {}", "Incidents released:".bold(), incidents.len());
    for incident in &incidents {
        println!("  {}", incident.raw_json);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir_connectors::fetcher::mock::MockLogSource;
    use ir_connectors::testing::sample_entries;

    fn config_in(dir: &std::path::Path, max_fetch: usize) -> AppConfig {
        let mut config = AppConfig::default();
        config.fetch.checkpoint_path = dir.join("checkpoint.json");
        config.fetch.max_fetch = max_fetch;
        config.fetch.first_fetch = "1 hour".to_string();
        config
    }

    #[tokio::test]
    async fn test_fetch_once_persists_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 3);
        let source = Arc::new(MockLogSource::with_pages(vec![sample_entries("a", 5)]));

        let first = fetch_once(&config, source.clone()).await.unwrap();
        assert_eq!(first.len(), 3);
        assert!(config.fetch.checkpoint_path.exists());

        let second = fetch_once(&config, source.clone()).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(source.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_fetch_once_failure_keeps_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 3);
        let source = Arc::new(MockLogSource::with_pages(vec![sample_entries("a", 2)]));
        source.fail_once_at_page(0).await;

        let err = fetch_once(&config, source).await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch log events"));
        assert!(!config.fetch.checkpoint_path.exists());
    }

    #[test]
    fn test_build_fetcher_rejects_bad_first_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path(), 3);
        config.fetch.first_fetch = "yesterday-ish".to_string();
        let source = Arc::new(MockLogSource::with_pages(vec![]));
        assert!(build_fetcher(&config, source).is_err());
    }
}
