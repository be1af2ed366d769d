// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION Insight.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use anyhow::Result;
use async_trait::async_trait;
use insight_types::RawReading;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default number of most recent readings requested per snapshot (30 days of hourly data)
pub const DEFAULT_HISTORY_LIMIT: usize = 24 * 30;

/// Bounded query for one site's reading history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub site_id: String,
    /// Most recent N readings by timestamp
    pub limit: usize,
}

impl HistoryQuery {
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Outcome of a fetch or a pushed change, as seen by the adapter
#[derive(Debug, Clone, PartialEq)]
pub enum SourceUpdate {
    /// Complete current contents of the site (may arrive unordered)
    Snapshot(Vec<RawReading>),
    /// Source reachable but the site holds no readings
    Empty,
    /// Fetch or subscription failed
    Failed(String),
}

impl SourceUpdate {
    /// Classify a fetch result
    pub fn from_fetch(result: Result<Option<Vec<RawReading>>>) -> Self {
        match result {
            Ok(Some(readings)) if !readings.is_empty() => Self::Snapshot(readings),
            Ok(_) => Self::Empty,
            Err(e) => Self::Failed(format!("{e:#}")),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Empty => "empty",
            Self::Failed(_) => "failed",
        }
    }
}

/// Live change feed of one site
///
/// Dropping the subscription stops the worker feeding it and releases
/// whatever the source holds for it (connections, watchers).
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<SourceUpdate>,
    worker: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<SourceUpdate>, worker: Option<JoinHandle<()>>) -> Self {
        Self { receiver, worker }
    }

    /// Next update, `None` once the feed has ended
    pub async fn recv(&mut self) -> Option<SourceUpdate> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

/// Data source abstraction for site reading history
///
/// Implementations deliver unordered batches of readings, either on demand
/// (`fetch`) or whenever the underlying store changes (`subscribe`).
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Fetch the bounded history of a site, `None` if the site has no data
    async fn fetch(&self, query: &HistoryQuery) -> Result<Option<Vec<RawReading>>>;

    /// Subscribe to changes; the first update carries the current contents
    async fn subscribe(&self, query: &HistoryQuery) -> Result<Subscription>;

    /// Check if data source is available
    async fn health_check(&self) -> Result<bool>;

    /// Get data source name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fetch_classification() {
        let reading = RawReading::new(1_000, 1.0, 1.0);
        assert_eq!(
            SourceUpdate::from_fetch(Ok(Some(vec![reading]))),
            SourceUpdate::Snapshot(vec![reading])
        );
        assert_eq!(SourceUpdate::from_fetch(Ok(Some(vec![]))), SourceUpdate::Empty);
        assert_eq!(SourceUpdate::from_fetch(Ok(None)), SourceUpdate::Empty);

        let failed = SourceUpdate::from_fetch(Err(anyhow::anyhow!("timeout")));
        assert_eq!(failed, SourceUpdate::Failed("timeout".to_owned()));
        assert_eq!(failed.kind(), "failed");
    }

    #[test]
    fn test_history_query_default_limit() {
        let query = HistoryQuery::new("house-1");
        assert_eq!(query.limit, 720);
        assert_eq!(query.with_limit(10).limit, 10);
    }

    #[tokio::test]
    async fn test_subscription_drop_aborts_worker() {
        let (tx, rx) = mpsc::channel(1);
        let worker = tokio::spawn(async move {
            // Holds the sender open until aborted
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        let abort = worker.abort_handle();

        let subscription = Subscription::new(rx, Some(worker));
        drop(subscription);
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(abort.is_finished());
    }
}
