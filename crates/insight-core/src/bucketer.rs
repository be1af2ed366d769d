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

//! Reduction of raw readings into fixed-shape chart series.
//!
//! Readings are grouped by a calendar key (hour of day, day of week or day of
//! month) computed in the local timezone of `now`, averaged per group and laid
//! out in display order. The result always has the full length of the
//! granularity; groups without readings get neutral values.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use insight_types::{ChartPoint, Granularity, RawReading, Series, SeriesByGranularity, WeatherTag};
use tracing::{debug, warn};

/// Temperature used when a bucket has no temperature samples (°C)
pub const NEUTRAL_TEMPERATURE_C: f64 = 20.0;

/// Humidity used when a bucket has no humidity samples (%)
pub const NEUTRAL_HUMIDITY_PCT: f64 = 50.0;

/// Weekday labels indexed by days from Sunday
const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Keys are stored densely; day-of-month uses 1..=31 so index 0 stays unused
const MAX_KEY_SPACE: usize = 32;

/// Calendar key of an instant for the given granularity
///
/// Hour → 0-23, Week → 0-6 (0 = Sunday), Month → 1-31.
pub fn bucket_key(timestamp: DateTime<Utc>, granularity: Granularity, tz: Tz) -> usize {
    let local = timestamp.with_timezone(&tz);
    match granularity {
        Granularity::Hour => local.hour() as usize,
        Granularity::Week => local.weekday().num_days_from_sunday() as usize,
        Granularity::Month => local.day() as usize,
    }
}

/// Key shown at display position `index` for the given "now"
///
/// Week and month windows roll so that today's key comes first.
pub fn key_at(granularity: Granularity, index: usize, now: &DateTime<Tz>) -> usize {
    match granularity {
        Granularity::Hour => index % 24,
        Granularity::Week => (now.weekday().num_days_from_sunday() as usize + index) % 7,
        Granularity::Month => ((now.day() as usize - 1 + index) % 30) + 1,
    }
}

/// Axis label of a key
pub fn key_label(granularity: Granularity, key: usize) -> String {
    match granularity {
        Granularity::Hour => format!("{key:02}:00"),
        Granularity::Week => WEEKDAY_LABELS[key % 7].to_owned(),
        Granularity::Month => key.to_string(),
    }
}

/// Efficiency percentage of a bucket, floored and capped to 0-100
///
/// Takes mean watts; consumption below 1 W is treated as 1 W so an idle
/// bucket never divides by zero.
pub fn efficiency_pct(production_w: f64, consumption_w: f64) -> u8 {
    let ratio = (production_w / consumption_w.max(1.0) * 100.0).floor();
    if ratio.is_nan() {
        return 0;
    }
    ratio.clamp(0.0, 100.0) as u8
}

/// Running sums for one bucket
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: usize,
    production_w: f64,
    consumption_w: f64,
    /// Missing environment values count as 0
    temperature_sum: f64,
    humidity_sum: f64,
}

impl Accumulator {
    fn add(&mut self, reading: &RawReading) {
        self.count += 1;
        self.production_w += reading.production_w;
        self.consumption_w += reading.consumption_w;
        self.temperature_sum += reading.temperature_c.unwrap_or(0.0);
        self.humidity_sum += reading.humidity_pct.unwrap_or(0.0);
    }

    fn mean(&self, sum: f64, fallback: f64) -> f64 {
        if self.count == 0 {
            fallback
        } else {
            sum / self.count as f64
        }
    }

    fn reduce(&self, label: String) -> ChartPoint {
        let production_w = self.mean(self.production_w, 0.0);
        let consumption_w = self.mean(self.consumption_w, 0.0);
        let temperature_c = self.mean(self.temperature_sum, NEUTRAL_TEMPERATURE_C);
        let humidity_pct = self.mean(self.humidity_sum, NEUTRAL_HUMIDITY_PCT);

        ChartPoint {
            label,
            production_kwh: production_w / 1000.0,
            consumption_kwh: consumption_w / 1000.0,
            efficiency_pct: efficiency_pct(production_w, consumption_w),
            temperature_c,
            humidity_pct: Some(humidity_pct),
            weather: WeatherTag::from_temperature(temperature_c),
            sample_count: self.count,
        }
    }
}

/// Group readings by calendar key and reduce each group to a chart point
///
/// The timezone of `now` decides local bucket keys. Input order does not
/// matter and the output always has `granularity.len()` points.
pub fn bucket(readings: &[RawReading], granularity: Granularity, now: DateTime<Tz>) -> Series {
    let tz = now.timezone();
    let mut groups = [Accumulator::default(); MAX_KEY_SPACE];

    for reading in readings {
        let Some(timestamp) = reading.timestamp() else {
            warn!(
                "⚠️ Skipping reading with unrepresentable timestamp {}",
                reading.timestamp_ms
            );
            continue;
        };
        groups[bucket_key(timestamp, granularity, tz)].add(reading);
    }

    let points: Vec<ChartPoint> = (0..granularity.len())
        .map(|index| {
            let key = key_at(granularity, index, &now);
            groups[key].reduce(key_label(granularity, key))
        })
        .collect();

    let readings_used = points.iter().map(|p| p.sample_count).sum();

    debug!(
        "📊 Bucketed {} readings into {} {} points ({} used)",
        readings.len(),
        points.len(),
        granularity,
        readings_used
    );

    Series {
        granularity,
        points,
        readings_used,
    }
}

/// Bucket the same readings at every granularity
pub fn bucket_all(readings: &[RawReading], now: DateTime<Tz>) -> SeriesByGranularity {
    SeriesByGranularity {
        hour: bucket(readings, Granularity::Hour, now),
        week: bucket(readings, Granularity::Week, now),
        month: bucket(readings, Granularity::Month, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Tuesday 2025-06-10 12:30 UTC
    fn now_utc() -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2025, 6, 10, 12, 30, 0).unwrap()
    }

    fn at(hour: u32, minute: u32) -> i64 {
        Utc.with_ymd_and_hms(2025, 6, 10, hour, minute, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_hour_bucket_means() {
        let readings = vec![
            RawReading::new(at(7, 5), 1500.0, 800.0).with_environment(Some(22.0), Some(60.0)),
            RawReading::new(at(7, 40), 2500.0, 1200.0).with_environment(Some(24.0), Some(70.0)),
        ];

        let series = bucket(&readings, Granularity::Hour, now_utc());
        assert_eq!(series.len(), 24);

        let point = &series.points[7];
        assert_eq!(point.label, "07:00");
        assert!((point.production_kwh - 2.0).abs() < 1e-9);
        assert!((point.consumption_kwh - 1.0).abs() < 1e-9);
        assert_eq!(point.efficiency_pct, 100);
        assert!((point.temperature_c - 23.0).abs() < 1e-9);
        assert_eq!(point.humidity_pct, Some(65.0));
        assert_eq!(point.weather, WeatherTag::Cloudy);
        assert_eq!(point.sample_count, 2);
    }

    #[test]
    fn test_empty_bucket_is_neutral() {
        let readings = vec![RawReading::new(at(7, 0), 2000.0, 1000.0)];
        let series = bucket(&readings, Granularity::Hour, now_utc());

        let point = &series.points[3];
        assert_eq!(point.label, "03:00");
        assert_eq!(point.production_kwh, 0.0);
        assert_eq!(point.consumption_kwh, 0.0);
        assert_eq!(point.temperature_c, NEUTRAL_TEMPERATURE_C);
        assert_eq!(point.humidity_pct, Some(NEUTRAL_HUMIDITY_PCT));
        assert_eq!(point.weather, WeatherTag::Cloudy);
        assert_eq!(point.sample_count, 0);
    }

    #[test]
    fn test_empty_input_signals_no_data() {
        for granularity in Granularity::all() {
            let series = bucket(&[], *granularity, now_utc());
            assert_eq!(series.len(), granularity.len());
            assert!(series.is_no_data());
        }
    }

    #[test]
    fn test_missing_environment_counts_as_zero() {
        let readings = vec![
            RawReading::new(at(9, 0), 100.0, 100.0),
            RawReading::new(at(9, 30), 100.0, 100.0).with_environment(Some(30.0), None),
        ];
        let point = &bucket(&readings, Granularity::Hour, now_utc()).points[9];

        // Means run over the whole group, absent values add nothing
        assert_eq!(point.temperature_c, 15.0);
        assert_eq!(point.weather, WeatherTag::Cloudy);
        assert_eq!(point.humidity_pct, Some(0.0));
    }

    #[test]
    fn test_efficiency_clamped() {
        assert_eq!(efficiency_pct(5.0, 0.0), 100);
        assert_eq!(efficiency_pct(0.0, 0.0), 0);
        assert_eq!(efficiency_pct(0.5, 2.0), 25);
        assert_eq!(efficiency_pct(f64::NAN, 1.0), 0);
    }

    #[test]
    fn test_efficiency_uses_watts() {
        let readings = vec![RawReading::new(at(9, 0), 300.0, 500.0)];
        let point = &bucket(&readings, Granularity::Hour, now_utc()).points[9];
        assert_eq!(point.efficiency_pct, 60);
        assert!((point.consumption_kwh - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_week_window_starts_today() {
        let series = bucket(&[], Granularity::Week, now_utc());
        let labels: Vec<&str> = series.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["Tue", "Wed", "Thu", "Fri", "Sat", "Sun", "Mon"]);
    }

    #[test]
    fn test_month_window_wraps() {
        let now = Tz::UTC.with_ymd_and_hms(2025, 1, 31, 8, 0, 0).unwrap();
        let series = bucket(&[], Granularity::Month, now);
        assert_eq!(series.points[0].label, "1");
        assert_eq!(series.points[29].label, "30");

        let now = Tz::UTC.with_ymd_and_hms(2025, 1, 28, 8, 0, 0).unwrap();
        let series = bucket(&[], Granularity::Month, now);
        let labels: Vec<&str> = series.points.iter().take(4).map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["28", "29", "30", "1"]);
    }

    #[test]
    fn test_day_31_not_shown() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 31, 10, 0, 0).unwrap().timestamp_millis();
        let now = Tz::UTC.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        let series = bucket(&[RawReading::new(ts, 100.0, 100.0)], Granularity::Month, now);
        assert!(series.is_no_data());
    }

    #[test]
    fn test_local_timezone_keys() {
        let prague: Tz = "Europe/Prague".parse().unwrap();
        let now = now_utc().with_timezone(&prague);
        // 07:00 UTC is 09:00 in Prague during summer time
        let series = bucket(&[RawReading::new(at(7, 0), 1000.0, 0.0)], Granularity::Hour, now);
        assert_eq!(series.points[9].sample_count, 1);
        assert_eq!(series.points[7].sample_count, 0);
    }

    #[test]
    fn test_order_independent() {
        let mut readings = vec![
            RawReading::new(at(1, 0), 10.0, 20.0),
            RawReading::new(at(1, 30), 30.0, 40.0),
            RawReading::new(at(13, 0), 500.0, 250.0),
        ];
        let forward = bucket_all(&readings, now_utc());
        readings.reverse();
        let backward = bucket_all(&readings, now_utc());
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_out_of_range_timestamp_skipped() {
        let readings = vec![
            RawReading::new(i64::MAX, 100.0, 100.0),
            RawReading::new(at(2, 0), 100.0, 100.0),
        ];
        let series = bucket(&readings, Granularity::Hour, now_utc());
        assert_eq!(series.readings_used, 1);
    }
}
