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

use crate::metrics::EnergyMetrics;
use crate::series::SeriesByGranularity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-fatal condition that forced the dashboard onto synthetic data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataAdvisory {
    /// Source reachable but the site has no readings
    NoData,
    /// Subscribe or fetch failed
    SourceUnavailable { reason: String },
}

impl DataAdvisory {
    /// User-visible advisory message
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoData => "No real-time data found. Using demo data.",
            Self::SourceUnavailable { .. } => "Failed to fetch energy data. Using demo data.",
        }
    }
}

impl fmt::Display for DataAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "no data"),
            Self::SourceUnavailable { reason } => write!(f, "source unavailable: {reason}"),
        }
    }
}

/// Where the currently shown series came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Live,
    Synthetic,
}

/// Snapshot handed to the presentation layer
///
/// Consumers treat it as read-only; each update replaces it as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub series: SeriesByGranularity,
    pub metrics: EnergyMetrics,
    pub is_loading: bool,
    /// Advisory message accompanying synthetic data
    pub error: Option<String>,
    pub origin: Option<DataOrigin>,
    pub last_update: DateTime<Utc>,
    /// Sequence number of the update that produced this state (0 = initial)
    pub version: u64,
}

impl DashboardState {
    /// Initial state shown until the first snapshot has been processed
    pub fn loading(now: DateTime<Utc>) -> Self {
        Self {
            series: SeriesByGranularity::empty(),
            metrics: EnergyMetrics::zero(),
            is_loading: true,
            error: None,
            origin: None,
            last_update: now,
            version: 0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == Some(DataOrigin::Synthetic)
    }
}
