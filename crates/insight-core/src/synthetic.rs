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

//! Fallback series shown when the source has nothing usable.

use crate::bucketer::{key_at, key_label};
use chrono::DateTime;
use chrono_tz::Tz;
use insight_types::{ChartPoint, Granularity, Series, WeatherTag};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::fmt::Debug;

/// Produces plausible series with the same shape as real bucketed data
pub trait SyntheticGenerator: Send + Sync + Debug {
    fn generate(&self, granularity: Granularity, now: DateTime<Tz>) -> Series;
}

/// Random demo data with a daily temperature curve
#[derive(Debug)]
pub struct RandomSynthetic {
    rng: Mutex<StdRng>,
}

impl RandomSynthetic {
    /// Deterministic generator for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn temperature(rng: &mut StdRng, granularity: Granularity, key: usize) -> f64 {
        match granularity {
            // Daily sine swing of ±8 °C around 20 °C
            Granularity::Hour => 20.0 + 8.0 * (((key + 6) % 24) as f64 / 24.0 * 2.0 * PI).sin(),
            Granularity::Week | Granularity::Month => 20.0 + rng.gen_range(0.0..16.0),
        }
    }
}

impl Default for RandomSynthetic {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl SyntheticGenerator for RandomSynthetic {
    fn generate(&self, granularity: Granularity, now: DateTime<Tz>) -> Series {
        let mut rng = self.rng.lock();

        let points = (0..granularity.len())
            .map(|index| {
                let key = key_at(granularity, index, &now);
                let temperature_c = Self::temperature(&mut rng, granularity, key);
                let production_kwh = (rng.gen_range(0.0..15.0) + (temperature_c - 15.0)).max(0.0);
                let consumption_kwh = rng.gen_range(0.0..25.0) + 15.0;
                let efficiency_pct: u8 = rng.gen_range(80..100);

                ChartPoint {
                    label: key_label(granularity, key),
                    production_kwh,
                    consumption_kwh,
                    efficiency_pct,
                    temperature_c,
                    humidity_pct: None,
                    weather: WeatherTag::from_temperature(temperature_c),
                    sample_count: 0,
                }
            })
            .collect();

        Series {
            granularity,
            points,
            readings_used: 0,
        }
    }
}
