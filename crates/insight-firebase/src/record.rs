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

use insight_core::{RawReading, normalize_epoch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

/// One record under `houses/{site}` as written by the ingest bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirebaseRecord {
    #[serde(default)]
    pub consumption_wattage: Option<f64>,
    #[serde(default)]
    pub production_wattage: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    /// Epoch seconds or milliseconds
    pub timestamp: f64,
}

impl FirebaseRecord {
    /// Convert to a reading, `None` if the timestamp is unusable
    pub fn to_reading(&self) -> Option<RawReading> {
        if !self.timestamp.is_finite() {
            return None;
        }
        let timestamp_ms = normalize_epoch(self.timestamp as i64);
        let reading = RawReading::new(
            timestamp_ms,
            self.production_wattage.unwrap_or(0.0),
            self.consumption_wattage.unwrap_or(0.0),
        )
        .with_environment(self.temperature, self.humidity);
        reading.timestamp().map(|_| reading)
    }
}

/// Convert a site snapshot body into readings
///
/// The database returns an object keyed by push id, or an array when keys
/// happen to be numeric. Records that fail to convert are skipped.
pub fn parse_snapshot(body: Value) -> Vec<RawReading> {
    let records: Vec<(String, Value)> = match body {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        _ => Vec::new(),
    };

    records
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(key, value)| {
            match serde_json::from_value::<FirebaseRecord>(value) {
                Ok(record) => {
                    let reading = record.to_reading();
                    if reading.is_none() {
                        trace!("Skipping record {key}: timestamp out of range");
                    }
                    reading
                }
                Err(e) => {
                    trace!("Skipping record {key}: {e}");
                    None
                }
            }
        })
        .collect()
}
