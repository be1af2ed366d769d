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

pub mod dashboard;
pub mod metrics;
pub mod reading;
pub mod series;

// Re-export common types for convenience
pub use dashboard::{DashboardState, DataAdvisory, DataOrigin};
pub use metrics::EnergyMetrics;
pub use reading::{RawReading, normalize_epoch};
pub use series::{ChartPoint, Granularity, Series, SeriesByGranularity, UnknownGranularity, WeatherTag};
