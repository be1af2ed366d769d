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

//! Source adapter: turns reading-source updates into dashboard states.
//!
//! Two triggers feed one event channel: the live subscription forwards every
//! pushed update, and a fixed-interval timer requests a fresh fetch. A
//! single pipeline task consumes the channel, runs bucketing and metrics to
//! completion for each update and publishes the result as one `Arc`.
//!
//! Every update carries a version allocated when its fetch starts or when
//! the push is received. The pipeline drops any update whose version is not
//! newer than the last one it applied, so a slow fetch can never overwrite
//! data from a later push.

use crate::bucketer::bucket_all;
use crate::clock::Clock;
use crate::metrics::derive_metrics_at;
use crate::synthetic::SyntheticGenerator;
use crate::traits::{HistoryQuery, ReadingSource, SourceUpdate};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use insight_types::{DashboardState, DataAdvisory, DataOrigin, Granularity, SeriesByGranularity};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Default refresh period of the timer trigger
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Adapter settings
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub query: HistoryQuery,
    pub poll_interval: Duration,
    /// Timezone used for bucket keys and the current hour
    pub timezone: Tz,
}

impl AdapterConfig {
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            query: HistoryQuery::new(site_id),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timezone: Tz::UTC,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.query.limit = limit;
        self
    }
}

/// Event consumed by the pipeline task
#[derive(Debug)]
enum PipelineEvent {
    /// Result of a fetch or a pushed change
    Update { version: u64, update: SourceUpdate },
    /// Request for a fresh fetch
    Tick,
}

/// Build the dashboard state for one source update
///
/// Empty and failed updates fall back to synthetic data for all three
/// granularities together with an advisory message.
pub fn build_state(
    update: SourceUpdate,
    generator: &dyn SyntheticGenerator,
    now: DateTime<Tz>,
    version: u64,
) -> DashboardState {
    let advisory = match update {
        SourceUpdate::Snapshot(mut readings) if !readings.is_empty() => {
            readings.sort_by_key(|r| r.timestamp_ms);
            let series = bucket_all(&readings, now);
            let metrics = derive_metrics_at(&series.hour, now);
            return DashboardState {
                series,
                metrics,
                is_loading: false,
                error: None,
                origin: Some(DataOrigin::Live),
                last_update: now.with_timezone(&Utc),
                version,
            };
        }
        SourceUpdate::Snapshot(_) | SourceUpdate::Empty => DataAdvisory::NoData,
        SourceUpdate::Failed(reason) => DataAdvisory::SourceUnavailable { reason },
    };
    debug!("Falling back to synthetic series ({advisory})");

    let series = SeriesByGranularity {
        hour: generator.generate(Granularity::Hour, now),
        week: generator.generate(Granularity::Week, now),
        month: generator.generate(Granularity::Month, now),
    };
    let metrics = derive_metrics_at(&series.hour, now);

    DashboardState {
        series,
        metrics,
        is_loading: false,
        error: Some(advisory.message().to_owned()),
        origin: Some(DataOrigin::Synthetic),
        last_update: now.with_timezone(&Utc),
        version,
    }
}

/// Spawns and wires the adapter tasks
#[derive(Debug)]
pub struct SourceAdapter;

impl SourceAdapter {
    /// Start the subscription forwarder, the poll timer and the pipeline
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        source: Arc<dyn ReadingSource>,
        generator: Arc<dyn SyntheticGenerator>,
        clock: Arc<dyn Clock>,
        config: AdapterConfig,
    ) -> AdapterHandle {
        info!(
            "📊 Starting source adapter: source={}, site={}, poll every {}s, tz={}",
            source.name(),
            config.query.site_id,
            config.poll_interval.as_secs(),
            config.timezone
        );

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(Arc::new(DashboardState::loading(clock.now())));
        let versions = Arc::new(AtomicU64::new(1));

        let subscription = tokio::spawn(forward_subscription(
            Arc::clone(&source),
            config.query.clone(),
            events_tx.clone(),
            Arc::clone(&versions),
        ));
        let timer = tokio::spawn(run_timer(config.poll_interval, events_tx.clone()));

        let pipeline = Pipeline {
            source,
            generator,
            clock,
            query: config.query,
            timezone: config.timezone,
            versions,
            events_tx: events_tx.clone(),
            state_tx,
            applied_version: 0,
            fetches: JoinSet::new(),
        };
        let pipeline = tokio::spawn(pipeline.run(events_rx));

        AdapterHandle {
            controller: AdapterController {
                events: events_tx,
                state: state_rx,
            },
            tasks: vec![timer, subscription, pipeline],
        }
    }
}

/// Forward every update of the live subscription into the pipeline
async fn forward_subscription(
    source: Arc<dyn ReadingSource>,
    query: HistoryQuery,
    events: mpsc::Sender<PipelineEvent>,
    versions: Arc<AtomicU64>,
) {
    let mut subscription = match source.subscribe(&query).await {
        Ok(subscription) => {
            info!("✅ Subscribed to {} for site '{}'", source.name(), query.site_id);
            subscription
        }
        Err(e) => {
            warn!("⚠️ Failed to subscribe to {}: {e:#}", source.name());
            let version = versions.fetch_add(1, Ordering::SeqCst);
            let update = SourceUpdate::Failed(format!("{e:#}"));
            if let Err(e) = events.send(PipelineEvent::Update { version, update }).await {
                error!("❌ Failed to send subscription failure to pipeline: {e}");
            }
            return;
        }
    };

    while let Some(update) = subscription.recv().await {
        let version = versions.fetch_add(1, Ordering::SeqCst);
        debug!("Received pushed {} (version {version})", update.kind());
        if events
            .send(PipelineEvent::Update { version, update })
            .await
            .is_err()
        {
            return;
        }
    }

    warn!(
        "⚠️ Subscription to {} ended, relying on periodic refresh",
        source.name()
    );
}

/// Post a tick every `period`, starting one period from now
async fn run_timer(period: Duration, events: mpsc::Sender<PipelineEvent>) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if events.send(PipelineEvent::Tick).await.is_err() {
            return;
        }
    }
}

struct Pipeline {
    source: Arc<dyn ReadingSource>,
    generator: Arc<dyn SyntheticGenerator>,
    clock: Arc<dyn Clock>,
    query: HistoryQuery,
    timezone: Tz,
    versions: Arc<AtomicU64>,
    events_tx: mpsc::Sender<PipelineEvent>,
    state_tx: watch::Sender<Arc<DashboardState>>,
    applied_version: u64,
    /// In-flight fetches, aborted together with the pipeline
    fetches: JoinSet<()>,
}

impl Pipeline {
    async fn run(mut self, mut events: mpsc::Receiver<PipelineEvent>) {
        info!("📊 Dashboard pipeline started");

        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::Tick => self.start_fetch(),
                PipelineEvent::Update { version, update } => self.apply(version, update),
            }
            // Reap finished fetches
            while self.fetches.try_join_next().is_some() {}
        }

        info!("📊 Dashboard pipeline stopped");
    }

    fn start_fetch(&mut self) {
        let version = self.versions.fetch_add(1, Ordering::SeqCst);
        let source = Arc::clone(&self.source);
        let query = self.query.clone();
        let events = self.events_tx.clone();

        debug!("🔄 Periodic fetch from {} (version {version})", source.name());
        self.fetches.spawn(async move {
            let update = SourceUpdate::from_fetch(source.fetch(&query).await);
            if let SourceUpdate::Failed(reason) = &update {
                warn!("⚠️ Fetch from {} failed: {reason}", source.name());
            }
            // Pipeline gone means shutdown
            let _ = events.send(PipelineEvent::Update { version, update }).await;
        });
    }

    fn apply(&mut self, version: u64, update: SourceUpdate) {
        if version <= self.applied_version {
            debug!(
                "Discarding stale {} (version {version} <= {})",
                update.kind(),
                self.applied_version
            );
            return;
        }

        let kind = update.kind();
        let now = self.clock.now_in(self.timezone);
        let state = build_state(update, self.generator.as_ref(), now, version);
        self.applied_version = version;

        match &state.error {
            None => info!(
                "✅ Dashboard updated from {kind} (version {version}, {} readings, {}% change)",
                state.series.hour.readings_used,
                state.metrics.percentage_change_display()
            ),
            Some(message) => warn!("⚠️ Dashboard on synthetic data (version {version}): {message}"),
        }

        self.state_tx.send_replace(Arc::new(state));
    }
}

/// Cloneable access to the published state
#[derive(Debug, Clone)]
pub struct AdapterController {
    events: mpsc::Sender<PipelineEvent>,
    state: watch::Receiver<Arc<DashboardState>>,
}

impl AdapterController {
    /// Latest published state
    pub fn state(&self) -> Arc<DashboardState> {
        Arc::clone(&self.state.borrow())
    }

    /// Receiver notified on every state replacement
    pub fn watch(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.state.clone()
    }

    /// Request an immediate fetch, same as a timer tick
    pub async fn refresh(&self) -> bool {
        self.events.send(PipelineEvent::Tick).await.is_ok()
    }
}

/// Owner of the adapter tasks
#[derive(Debug)]
pub struct AdapterHandle {
    controller: AdapterController,
    tasks: Vec<JoinHandle<()>>,
}

impl AdapterHandle {
    pub fn state(&self) -> Arc<DashboardState> {
        self.controller.state()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.controller.watch()
    }

    pub fn controller(&self) -> AdapterController {
        self.controller.clone()
    }

    pub async fn refresh(&self) -> bool {
        self.controller.refresh().await
    }

    /// Stop the timer, the subscription and the pipeline and wait for them
    ///
    /// The last state stays readable through existing receivers.
    pub async fn shutdown(mut self) {
        info!("🛑 Shutting down source adapter");
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks.drain(..) {
            match task.await {
                Err(e) if !e.is_cancelled() => error!("❌ Adapter task failed: {e}"),
                _ => {}
            }
        }
        info!("✅ Source adapter stopped");
    }
}

impl Drop for AdapterHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
