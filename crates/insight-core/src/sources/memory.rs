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

use crate::traits::{HistoryQuery, ReadingSource, SourceUpdate, Subscription};
use anyhow::{Result, bail};
use async_trait::async_trait;
use insight_types::RawReading;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

const SUBSCRIPTION_BUFFER: usize = 16;

#[derive(Debug)]
struct Store {
    sites: RwLock<HashMap<String, Vec<RawReading>>>,
    unavailable: AtomicBool,
    /// Bumped on every mutation, watched by subscriptions
    generation: watch::Sender<u64>,
}

impl Store {
    fn notify(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    fn snapshot(&self, query: &HistoryQuery) -> Option<Vec<RawReading>> {
        let sites = self.sites.read();
        let readings = sites.get(&query.site_id)?;
        if readings.is_empty() {
            return None;
        }

        let mut readings = readings.clone();
        readings.sort_by_key(|r| r.timestamp_ms);
        let skip = readings.len().saturating_sub(query.limit);
        Some(readings.split_off(skip))
    }

    fn update_for(&self, query: &HistoryQuery) -> SourceUpdate {
        if self.unavailable.load(Ordering::SeqCst) {
            return SourceUpdate::Failed("memory source marked unavailable".to_owned());
        }
        match self.snapshot(query) {
            Some(readings) => SourceUpdate::Snapshot(readings),
            None => SourceUpdate::Empty,
        }
    }
}

/// In-process reading source keyed by site id
///
/// Backs demo mode and tests. Every mutation is pushed to open subscriptions.
#[derive(Debug, Clone)]
pub struct MemoryReadingSource {
    store: Arc<Store>,
}

impl MemoryReadingSource {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            store: Arc::new(Store {
                sites: RwLock::new(HashMap::new()),
                unavailable: AtomicBool::new(false),
                generation,
            }),
        }
    }

    pub fn insert(&self, site_id: &str, reading: RawReading) {
        self.store
            .sites
            .write()
            .entry(site_id.to_owned())
            .or_default()
            .push(reading);
        self.store.notify();
    }

    /// Insert a reading in place of any stored reading of the same time slot
    ///
    /// Slots are `slot_ms` wide and aligned to the epoch. A site fed faster
    /// than one reading per slot keeps only the latest reading of each slot.
    pub fn insert_in_slot(&self, site_id: &str, reading: RawReading, slot_ms: i64) {
        let slot_ms = slot_ms.max(1);
        let slot = reading.timestamp_ms.div_euclid(slot_ms);
        {
            let mut sites = self.store.sites.write();
            let readings = sites.entry(site_id.to_owned()).or_default();
            readings.retain(|r| r.timestamp_ms.div_euclid(slot_ms) != slot);
            readings.push(reading);
        }
        self.store.notify();
    }

    pub fn replace(&self, site_id: &str, readings: Vec<RawReading>) {
        self.store
            .sites
            .write()
            .insert(site_id.to_owned(), readings);
        self.store.notify();
    }

    pub fn clear(&self, site_id: &str) {
        self.store.sites.write().remove(site_id);
        self.store.notify();
    }

    /// Make fetches and subscriptions fail until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.store.unavailable.store(unavailable, Ordering::SeqCst);
        self.store.notify();
    }

    /// Number of readings stored for a site
    pub fn len(&self, site_id: &str) -> usize {
        self.store.sites.read().get(site_id).map_or(0, Vec::len)
    }

    /// Drop readings older than `cutoff_ms` for a site
    ///
    /// Subscribers are only notified when something was removed.
    pub fn retain_since(&self, site_id: &str, cutoff_ms: i64) {
        let removed = match self.store.sites.write().get_mut(site_id) {
            Some(readings) => {
                let before = readings.len();
                readings.retain(|r| r.timestamp_ms >= cutoff_ms);
                before - readings.len()
            }
            None => 0,
        };
        if removed > 0 {
            debug!("Dropped {removed} expired readings of site '{site_id}'");
            self.store.notify();
        }
    }
}

impl Default for MemoryReadingSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingSource for MemoryReadingSource {
    async fn fetch(&self, query: &HistoryQuery) -> Result<Option<Vec<RawReading>>> {
        if self.store.unavailable.load(Ordering::SeqCst) {
            bail!("memory source marked unavailable");
        }
        Ok(self.store.snapshot(query))
    }

    async fn subscribe(&self, query: &HistoryQuery) -> Result<Subscription> {
        if self.store.unavailable.load(Ordering::SeqCst) {
            bail!("memory source marked unavailable");
        }

        // Watch before reading the first snapshot so no change slips through
        let mut changes = self.store.generation.subscribe();
        let store = Arc::clone(&self.store);
        let query = query.clone();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        info!("📡 Memory subscription opened for site '{}'", query.site_id);

        let worker = tokio::spawn(async move {
            if tx.send(store.update_for(&query)).await.is_err() {
                return;
            }
            while changes.changed().await.is_ok() {
                let update = store.update_for(&query);
                debug!("Memory source changed, pushing {}", update.kind());
                if tx.send(update).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, Some(worker)))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.store.unavailable.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ts: i64) -> RawReading {
        RawReading::new(ts, 100.0, 50.0)
    }

    #[tokio::test]
    async fn test_fetch_missing_site_is_none() {
        let source = MemoryReadingSource::new();
        let result = source.fetch(&HistoryQuery::new("nowhere")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fetch_limits_to_most_recent() {
        let source = MemoryReadingSource::new();
        source.replace("site", vec![reading(5), reading(1), reading(4), reading(2), reading(3)]);

        let query = HistoryQuery::new("site").with_limit(3);
        let readings = source.fetch(&query).await.unwrap().unwrap();
        let timestamps: Vec<i64> = readings.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(timestamps, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_unavailable_fails() {
        let source = MemoryReadingSource::new();
        source.set_unavailable(true);
        assert!(source.fetch(&HistoryQuery::new("site")).await.is_err());
        assert!(source.subscribe(&HistoryQuery::new("site")).await.is_err());
        assert!(!source.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_subscription_pushes_changes() {
        let source = MemoryReadingSource::new();
        let mut subscription = source.subscribe(&HistoryQuery::new("site")).await.unwrap();

        assert_eq!(subscription.recv().await, Some(SourceUpdate::Empty));

        source.insert("site", reading(10));
        assert_eq!(
            subscription.recv().await,
            Some(SourceUpdate::Snapshot(vec![reading(10)]))
        );

        source.clear("site");
        assert_eq!(subscription.recv().await, Some(SourceUpdate::Empty));
    }

    #[tokio::test]
    async fn test_insert_in_slot_keeps_latest_per_slot() {
        let source = MemoryReadingSource::new();
        source.insert_in_slot("site", reading(1_000), 3_600_000);
        source.insert_in_slot("site", reading(2_000), 3_600_000);
        source.insert_in_slot("site", reading(3_600_500), 3_600_000);
        assert_eq!(source.len("site"), 2);

        let readings = source.fetch(&HistoryQuery::new("site")).await.unwrap().unwrap();
        let timestamps: Vec<i64> = readings.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(timestamps, vec![2_000, 3_600_500]);
    }

    #[tokio::test]
    async fn test_retain_since() {
        let source = MemoryReadingSource::new();
        source.replace("site", vec![reading(1), reading(2), reading(3)]);
        source.retain_since("site", 2);
        assert_eq!(source.len("site"), 2);
    }
}
