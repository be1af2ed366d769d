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
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Temperature above which a bucket is tagged as sunny (°C)
pub const SUNNY_THRESHOLD_C: f64 = 25.0;

/// Time dimension used to group readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Hour of day (0-23), shown as the "day" view
    Hour,
    /// Day of week (0-6, 0 = Sunday)
    Week,
    /// Day of month (1-30 rolling window)
    Month,
}

impl Granularity {
    /// Fixed number of points in a series of this granularity
    pub const fn len(self) -> usize {
        match self {
            Self::Hour => 24,
            Self::Week => 7,
            Self::Month => 30,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    pub fn all() -> &'static [Granularity] {
        &[Self::Hour, Self::Week, Self::Month]
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown granularity: '{0}'. Supported: day, hour, week, month")]
pub struct UnknownGranularity(pub String);

impl FromStr for Granularity {
    type Err = UnknownGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            // The dashboard calls the hourly view "day"
            "day" | "hour" => Ok(Self::Hour),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(UnknownGranularity(s.to_owned())),
        }
    }
}

/// Weather tag derived from bucket temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherTag {
    Sunny,
    Cloudy,
}

impl WeatherTag {
    pub fn from_temperature(temperature_c: f64) -> Self {
        if temperature_c > SUNNY_THRESHOLD_C {
            Self::Sunny
        } else {
            Self::Cloudy
        }
    }
}

/// One reduced, display-ready sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    /// Axis label ("07:00", "Tue", "14")
    pub label: String,

    /// Averaged production converted to kWh
    pub production_kwh: f64,

    /// Averaged consumption converted to kWh
    pub consumption_kwh: f64,

    /// Production over consumption, capped to 0-100
    pub efficiency_pct: u8,

    pub temperature_c: f64,

    pub humidity_pct: Option<f64>,

    pub weather: WeatherTag,

    /// Number of raw readings reduced into this point
    pub sample_count: usize,
}

/// Fixed-length series for one granularity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub granularity: Granularity,
    pub points: Vec<ChartPoint>,
    /// Raw readings that contributed to any point
    pub readings_used: usize,
}

impl Series {
    /// Series with no points, used before the first snapshot arrives
    pub fn empty(granularity: Granularity) -> Self {
        Self {
            granularity,
            points: Vec::new(),
            readings_used: 0,
        }
    }

    /// True when no reading contributed to the series
    pub fn is_no_data(&self) -> bool {
        self.readings_used == 0
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChartPoint> {
        self.points.get(index)
    }
}

/// The three series exposed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesByGranularity {
    pub hour: Series,
    pub week: Series,
    pub month: Series,
}

impl SeriesByGranularity {
    pub fn empty() -> Self {
        Self {
            hour: Series::empty(Granularity::Hour),
            week: Series::empty(Granularity::Week),
            month: Series::empty(Granularity::Month),
        }
    }

    pub fn get(&self, granularity: Granularity) -> &Series {
        match granularity {
            Granularity::Hour => &self.hour,
            Granularity::Week => &self.week,
            Granularity::Month => &self.month,
        }
    }
}
