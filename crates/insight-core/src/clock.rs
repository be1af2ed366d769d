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

use crate::error::{InsightError, InsightResult};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::fmt::Debug;

/// Source of the current instant
///
/// The bucketer and metrics deriver take "now" as a parameter; the adapter
/// reads it from here so tests can pin it.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Current instant in the given timezone
    fn now_in(&self, tz: Tz) -> DateTime<Tz> {
        self.now().with_timezone(&tz)
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut instant = self.instant.lock();
        *instant += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock()
    }
}

/// Parse an IANA timezone name (e.g. "Europe/Prague")
pub fn parse_timezone(name: &str) -> InsightResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| InsightError::InvalidTimezone(name.to_owned()))
}
