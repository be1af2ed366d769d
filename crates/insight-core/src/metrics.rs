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

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use insight_types::{EnergyMetrics, Series};

/// Highest hour index a peak can be reported at
const LAST_HOUR: usize = 23;

/// Relative change between two bucket productions in percent
///
/// Undefined (`None`) when the previous bucket produced nothing.
pub fn percentage_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() {
        return None;
    }
    let change = (current - previous) / previous * 100.0;
    change.is_finite().then_some(change)
}

/// Derive summary metrics from the hourly series
///
/// `current_hour` is clamped to the last point. The previous bucket of hour 0
/// wraps around to the last point of the series.
pub fn derive_metrics(hour_series: &Series, current_hour: u32) -> EnergyMetrics {
    let points = &hour_series.points;
    if points.is_empty() {
        return EnergyMetrics::zero();
    }

    let last = points.len() - 1;
    let current_index = (current_hour as usize).min(last);
    let current = &points[current_index];

    let daily_average =
        points.iter().map(|p| p.production_kwh).sum::<f64>() / points.len() as f64;

    // First index wins on ties
    let (peak_index, peak_production) = points.iter().enumerate().fold(
        (0, f64::NEG_INFINITY),
        |(best_index, best), (index, point)| {
            if point.production_kwh > best {
                (index, point.production_kwh)
            } else {
                (best_index, best)
            }
        },
    );

    let previous_index = if current_index == 0 {
        last
    } else {
        current_index - 1
    };
    let previous = points[previous_index].production_kwh;

    let change = percentage_change(current.production_kwh, previous);
    let is_increase = change.is_some_and(|c| !format!("{c:.1}").starts_with('-'));

    EnergyMetrics {
        current_production: current.production_kwh,
        daily_average,
        peak_production,
        peak_hour: peak_index.min(LAST_HOUR),
        current_efficiency: current.efficiency_pct,
        performance_ratio: format!("{:.2}", daily_average / peak_production.max(1.0)),
        percentage_change: change,
        is_increase,
        humidity: current.humidity_pct,
    }
}

/// Derive metrics for the local hour of `now`
pub fn derive_metrics_at(hour_series: &Series, now: DateTime<Tz>) -> EnergyMetrics {
    derive_metrics(hour_series, now.hour())
}
