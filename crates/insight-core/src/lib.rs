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

//! FluxION Insight core: bucketing, metrics and the source adapter pipeline.

pub mod adapter;
pub mod assembler;
pub mod bucketer;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod simulate;
pub mod sources;
pub mod synthetic;
pub mod traits;

pub use adapter::{AdapterConfig, AdapterController, AdapterHandle, SourceAdapter, build_state};
pub use assembler::{DeviceMessage, EnvironmentSample, PowerSample, ReadingAssembler};
pub use bucketer::{bucket, bucket_all};
pub use clock::{Clock, FixedClock, SystemClock, parse_timezone};
pub use error::{InsightError, InsightResult};
pub use metrics::{derive_metrics, derive_metrics_at};
pub use simulate::{DayCycle, SensorSimulator};
pub use sources::MemoryReadingSource;
pub use synthetic::{RandomSynthetic, SyntheticGenerator};
pub use traits::{DEFAULT_HISTORY_LIMIT, HistoryQuery, ReadingSource, SourceUpdate, Subscription};

// Re-export the data model for downstream crates
pub use insight_types::{
    ChartPoint, DashboardState, DataAdvisory, DataOrigin, EnergyMetrics, Granularity, RawReading,
    Series, SeriesByGranularity, UnknownGranularity, WeatherTag, normalize_epoch,
};
