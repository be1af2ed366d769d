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

//! Demo source: simulated panel and meter feeding an in-memory store.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use insight_core::assembler::{ENVIRONMENT_TOPIC, POWER_TOPIC};
use insight_core::{MemoryReadingSource, ReadingAssembler, SensorSimulator};
use tracing::{debug, info, warn};

/// Simulated days of history kept by the demo source
pub const DEMO_HISTORY_DAYS: i32 = 30;

/// Publishes simulated device payloads into a memory source
///
/// The store holds one reading per simulated hour, so the history stays
/// within the default query limit however fast the feed ticks.
#[derive(Debug)]
pub struct DemoFeed {
    source: MemoryReadingSource,
    simulator: SensorSimulator,
    assembler: ReadingAssembler,
    site_id: String,
    timezone: Tz,
}

impl DemoFeed {
    /// Seed `source` with simulated history up to `now`
    pub fn seed(
        source: MemoryReadingSource,
        simulator: SensorSimulator,
        site_id: impl Into<String>,
        timezone: Tz,
        now: DateTime<Utc>,
    ) -> Self {
        let feed = Self {
            source,
            simulator,
            assembler: ReadingAssembler::new(),
            site_id: site_id.into(),
            timezone,
        };

        let step = feed.simulator.hour_length();
        let history = feed
            .simulator
            .backfill(&now.with_timezone(&timezone), feed.history_span(), step);
        info!(
            "🧪 Demo mode: seeded {} simulated readings for site '{}'",
            history.len(),
            feed.site_id
        );
        for reading in history {
            feed.source
                .insert_in_slot(&feed.site_id, reading, step.num_milliseconds());
        }
        feed
    }

    fn history_span(&self) -> Duration {
        self.simulator.hour_length() * 24 * DEMO_HISTORY_DAYS
    }

    /// Publish one sample on each device topic and store the paired reading
    pub fn tick(&mut self, at: DateTime<Utc>) -> Result<()> {
        let local = at.with_timezone(&self.timezone);
        let environment = serde_json::to_vec(&self.simulator.environment_at(&local))?;
        let power = serde_json::to_vec(&self.simulator.power_at(&local))?;

        // Panel and meter report separately, the assembler pairs them
        self.assembler
            .push_payload(ENVIRONMENT_TOPIC, &environment, at)
            .context("Failed to decode simulated environment payload")?;
        let reading = self
            .assembler
            .push_payload(POWER_TOPIC, &power, at)
            .context("Failed to decode simulated power payload")?;

        if let Some(reading) = reading {
            let slot = self.simulator.hour_length().num_milliseconds();
            self.source.insert_in_slot(&self.site_id, reading, slot);
            debug!("🧪 Demo reading stored for site '{}'", self.site_id);
        }

        let cutoff = at - self.history_span();
        self.source
            .retain_since(&self.site_id, cutoff.timestamp_millis());
        Ok(())
    }

    /// Tick every `period` until the task is aborted
    pub async fn run(mut self, period: std::time::Duration) {
        let mut interval =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            interval.tick().await;
            if let Err(e) = self.tick(Utc::now()) {
                warn!("⚠️ Demo feed tick failed: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use insight_core::{DayCycle, HistoryQuery, ReadingSource};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    async fn span_of(source: &MemoryReadingSource) -> (usize, Duration) {
        let readings = source
            .fetch(&HistoryQuery::new("house-1"))
            .await
            .unwrap()
            .unwrap();
        let first = readings.first().unwrap().timestamp_ms;
        let last = readings.last().unwrap().timestamp_ms;
        (readings.len(), Duration::milliseconds(last - first))
    }

    #[tokio::test]
    async fn test_history_survives_fast_ticks() {
        let source = MemoryReadingSource::new();
        let mut feed = DemoFeed::seed(
            source.clone(),
            SensorSimulator::seeded(4),
            "house-1",
            Tz::UTC,
            now(),
        );

        // Three hours of ticks every ten seconds
        for tick in 1..=1080 {
            feed.tick(now() + Duration::seconds(tick * 10)).unwrap();
        }

        let (count, span) = span_of(&source).await;
        assert!(count <= 720);
        assert!(span > Duration::days(28), "history span {span}");
        assert!(source.len("house-1") <= 24 * 30 + 4);
    }

    #[tokio::test]
    async fn test_tick_stores_paired_reading() {
        let source = MemoryReadingSource::new();
        let mut feed = DemoFeed::seed(
            source.clone(),
            SensorSimulator::seeded(4),
            "house-1",
            Tz::UTC,
            now(),
        );

        feed.tick(now() + Duration::minutes(90)).unwrap();

        let readings = source
            .fetch(&HistoryQuery::new("house-1"))
            .await
            .unwrap()
            .unwrap();
        let latest = readings.last().unwrap();
        assert_eq!(
            latest.timestamp_ms,
            (now() + Duration::minutes(90)).timestamp_millis()
        );
        assert!(latest.temperature_c.is_some());
        assert!(latest.humidity_pct.is_some());
    }

    #[tokio::test]
    async fn test_compressed_history_spans_simulated_days() {
        let source = MemoryReadingSource::new();
        let simulator = SensorSimulator::seeded(4).with_cycle(DayCycle::Compressed {
            seconds_per_hour: 60,
        });
        let _feed = DemoFeed::seed(source.clone(), simulator, "house-1", Tz::UTC, now());

        let (count, span) = span_of(&source).await;
        assert!(count >= 719);
        assert!(span >= Duration::minutes(24 * 30 - 1));

        let readings = source
            .fetch(&HistoryQuery::new("house-1"))
            .await
            .unwrap()
            .unwrap();
        assert!(readings.iter().any(|r| r.production_w > 0.0));
        assert!(readings.iter().any(|r| r.production_w == 0.0));
    }
}
