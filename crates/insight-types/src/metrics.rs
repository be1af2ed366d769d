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

use serde::{Deserialize, Serialize};

/// Point-in-time statistics derived from the hourly series
///
/// Recomputed for every new series and always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyMetrics {
    /// Production of the bucket for the current hour (kWh)
    pub current_production: f64,

    /// Mean production over the whole series (kWh)
    pub daily_average: f64,

    /// Highest bucket production (kWh)
    pub peak_production: f64,

    /// First bucket index reaching the peak (0-23)
    pub peak_hour: usize,

    pub current_efficiency: u8,

    /// Average over peak, formatted with two decimals
    pub performance_ratio: String,

    /// Change vs. the previous bucket (%), `None` when the previous bucket produced nothing
    pub percentage_change: Option<f64>,

    /// Trend flag; zero change counts as an increase, undefined change does not
    pub is_increase: bool,

    pub humidity: Option<f64>,
}

impl EnergyMetrics {
    /// Metrics for an empty series
    pub fn zero() -> Self {
        Self {
            current_production: 0.0,
            daily_average: 0.0,
            peak_production: 0.0,
            peak_hour: 0,
            current_efficiency: 0,
            performance_ratio: "0.00".to_owned(),
            percentage_change: Some(0.0),
            is_increase: false,
            humidity: None,
        }
    }

    /// Percentage change rendered for display ("12.5", "-3.0" or "n/a")
    pub fn percentage_change_display(&self) -> String {
        match self.percentage_change {
            Some(change) => format!("{change:.1}"),
            None => "n/a".to_owned(),
        }
    }
}

impl Default for EnergyMetrics {
    fn default() -> Self {
        Self::zero()
    }
}
