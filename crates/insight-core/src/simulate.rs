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

//! Simulated panel and meter feeds for demo mode.
//!
//! Each feed follows a daily curve: temperature peaks mid-afternoon,
//! humidity is highest at night, consumption has a morning and an evening
//! peak and production follows the sun between 06:00 and 18:00.

use crate::assembler::{DeviceMessage, EnvironmentSample, PowerSample, ReadingAssembler};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use insight_types::RawReading;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// How the simulated hour of day is derived from wall time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayCycle {
    /// Follow the local clock
    RealTime,
    /// One simulated hour every `seconds_per_hour` seconds of UTC time
    Compressed { seconds_per_hour: u32 },
}

#[derive(Debug)]
pub struct SensorSimulator {
    rng: Mutex<StdRng>,
    noise: bool,
    cycle: DayCycle,
}

impl SensorSimulator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            noise: true,
            cycle: DayCycle::RealTime,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            noise: true,
            cycle: DayCycle::RealTime,
        }
    }

    /// Exact curves without random jitter
    #[must_use]
    pub fn without_noise(mut self) -> Self {
        self.noise = false;
        self
    }

    #[must_use]
    pub fn with_cycle(mut self, cycle: DayCycle) -> Self {
        self.cycle = cycle;
        self
    }

    /// Fractional simulated hour (0.0..24.0)
    pub fn hour_of<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> f64 {
        match self.cycle {
            DayCycle::RealTime => {
                f64::from(now.hour()) + f64::from(now.minute()) / 60.0
                    + f64::from(now.second()) / 3600.0
            }
            DayCycle::Compressed { seconds_per_hour } => {
                let seconds = now.timestamp() as f64;
                (seconds / f64::from(seconds_per_hour.max(1))).floor() % 24.0
            }
        }
    }

    /// Wall-clock length of one simulated hour
    pub fn hour_length(&self) -> Duration {
        match self.cycle {
            DayCycle::RealTime => Duration::hours(1),
            DayCycle::Compressed { seconds_per_hour } => {
                Duration::seconds(i64::from(seconds_per_hour.max(1)))
            }
        }
    }

    fn jitter(&self, amplitude: f64) -> f64 {
        if self.noise {
            self.rng.lock().gen_range(-amplitude..amplitude)
        } else {
            0.0
        }
    }

    pub fn environment_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> EnvironmentSample {
        let h = self.hour_of(now);
        let temperature = 10.0 + 10.0 * ((h - 5.0) / 24.0 * 2.0 * PI).sin() + self.jitter(1.0);
        let humidity = 70.0 - 20.0 * ((h - 2.0) / 24.0 * 2.0 * PI).sin() + self.jitter(3.0);
        EnvironmentSample {
            temperature,
            humidity,
        }
    }

    pub fn power_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> PowerSample {
        let h = self.hour_of(now);
        let peaks = (-(h - 8.0).powi(2) / 10.0).exp() + (-(h - 18.0).powi(2) / 10.0).exp();
        let consumption_wattage = 200.0 + 150.0 * peaks + self.jitter(20.0);
        let production_wattage =
            ((300.0 * ((h - 6.0) / 12.0 * PI).sin()).max(0.0) + self.jitter(30.0)).max(0.0);
        PowerSample {
            consumption_wattage,
            production_wattage,
        }
    }

    /// One assembled reading for the given instant
    pub fn reading_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> RawReading {
        let at = now.with_timezone(&Utc);
        let mut assembler = ReadingAssembler::new();
        assembler.push(DeviceMessage::Environment(self.environment_at(now)), at);
        // The second push always completes the pair
        assembler
            .push(DeviceMessage::Power(self.power_at(now)), at)
            .unwrap_or_else(|| RawReading::new(at.timestamp_millis(), 0.0, 0.0))
    }

    /// History of readings every `step` over the `span` leading up to `now`
    pub fn backfill<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        span: Duration,
        step: Duration,
    ) -> Vec<RawReading> {
        if step <= Duration::zero() || span < Duration::zero() {
            return Vec::new();
        }

        let mut readings = Vec::new();
        let mut at = now.clone() - span;
        while at <= *now {
            readings.push(self.reading_at(&at));
            at = at + step;
        }
        readings
    }
}

impl Default for SensorSimulator {
    fn default() -> Self {
        Self::new()
    }
}
