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

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Epoch values below this are treated as seconds rather than milliseconds.
/// 10^11 ms is March 1973, 10^11 s is far beyond any plausible sensor clock.
const SECONDS_EPOCH_CEILING: i64 = 100_000_000_000;

/// Normalize an epoch timestamp to milliseconds
///
/// The ingest bridge stores whole seconds while every consumer works in
/// milliseconds, so both forms show up in the same site history.
pub fn normalize_epoch(value: i64) -> i64 {
    if value.abs() < SECONDS_EPOCH_CEILING {
        value.saturating_mul(1000)
    } else {
        value
    }
}

/// One sensor sample as delivered by the reading source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    /// Sample time (epoch milliseconds)
    pub timestamp_ms: i64,

    /// Solar production (W, non-negative)
    #[serde(default)]
    pub production_w: f64,

    /// House consumption (W, non-negative)
    #[serde(default)]
    pub consumption_w: f64,

    /// Ambient temperature (°C)
    #[serde(default)]
    pub temperature_c: Option<f64>,

    /// Relative humidity (0-100%)
    #[serde(default)]
    pub humidity_pct: Option<f64>,
}

impl RawReading {
    /// Create a reading with power values only
    pub fn new(timestamp_ms: i64, production_w: f64, consumption_w: f64) -> Self {
        Self {
            timestamp_ms,
            production_w: production_w.max(0.0),
            consumption_w: consumption_w.max(0.0),
            temperature_c: None,
            humidity_pct: None,
        }
    }

    /// Attach environment values
    #[must_use]
    pub fn with_environment(mut self, temperature_c: Option<f64>, humidity_pct: Option<f64>) -> Self {
        self.temperature_c = temperature_c;
        self.humidity_pct = humidity_pct.map(|h| h.clamp(0.0, 100.0));
        self
    }

    /// Sample time as a UTC instant, `None` if the value is out of chrono's range
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }
}
