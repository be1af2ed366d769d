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
use chrono::{DateTime, Utc};
use insight_types::RawReading;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Topic of the panel-side environment sensor
pub const ENVIRONMENT_TOPIC: &str = "sensor/solar_panel_rpi";

/// Topic of the wattage meter
pub const POWER_TOPIC: &str = "sensor/wattage_meter_rt_c_component";

/// Environment sample from the panel sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSample {
    pub temperature: f64,
    pub humidity: f64,
}

/// Power sample from the wattage meter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub consumption_wattage: f64,
    pub production_wattage: f64,
}

/// Message from one of the two device feeds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceMessage {
    Environment(EnvironmentSample),
    Power(PowerSample),
}

impl DeviceMessage {
    /// Decode a JSON payload published on a device topic
    pub fn parse(topic: &str, payload: &[u8]) -> InsightResult<Self> {
        match topic {
            ENVIRONMENT_TOPIC => Ok(Self::Environment(serde_json::from_slice(payload)?)),
            POWER_TOPIC => Ok(Self::Power(serde_json::from_slice(payload)?)),
            other => Err(InsightError::UnknownTopic(other.to_owned())),
        }
    }
}

/// Joins the latest sample of each feed into one reading
///
/// A newer sample on the same feed overwrites the held one. Once both feeds
/// have a sample a reading is emitted and both slots are cleared.
#[derive(Debug, Default)]
pub struct ReadingAssembler {
    environment: Option<EnvironmentSample>,
    power: Option<PowerSample>,
}

impl ReadingAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: DeviceMessage, at: DateTime<Utc>) -> Option<RawReading> {
        match message {
            DeviceMessage::Environment(sample) => self.environment = Some(sample),
            DeviceMessage::Power(sample) => self.power = Some(sample),
        }

        let (Some(environment), Some(power)) = (self.environment, self.power) else {
            trace!(
                "Waiting for {} sample",
                if self.environment.is_none() {
                    "environment"
                } else {
                    "power"
                }
            );
            return None;
        };

        self.environment = None;
        self.power = None;

        let reading = RawReading::new(
            at.timestamp_millis(),
            power.production_wattage,
            power.consumption_wattage,
        )
        .with_environment(Some(environment.temperature), Some(environment.humidity));

        debug!(
            "🔗 Assembled reading: {:.0} W produced, {:.0} W consumed, {:.1} °C",
            reading.production_w, reading.consumption_w, environment.temperature
        );
        Some(reading)
    }

    /// Decode a device payload and push it
    pub fn push_payload(
        &mut self,
        topic: &str,
        payload: &[u8],
        at: DateTime<Utc>,
    ) -> InsightResult<Option<RawReading>> {
        let message = DeviceMessage::parse(topic, payload)?;
        Ok(self.push(message, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_pairs_latest_samples() {
        let mut assembler = ReadingAssembler::new();

        let first = DeviceMessage::Environment(EnvironmentSample {
            temperature: 18.0,
            humidity: 60.0,
        });
        let second = DeviceMessage::Environment(EnvironmentSample {
            temperature: 21.5,
            humidity: 55.0,
        });
        assert!(assembler.push(first, at()).is_none());
        assert!(assembler.push(second, at()).is_none());

        let power = DeviceMessage::Power(PowerSample {
            consumption_wattage: 420.0,
            production_wattage: 275.0,
        });
        let reading = assembler.push(power, at()).unwrap();

        assert_eq!(reading.timestamp_ms, at().timestamp_millis());
        assert_eq!(reading.production_w, 275.0);
        assert_eq!(reading.consumption_w, 420.0);
        assert_eq!(reading.temperature_c, Some(21.5));
        assert_eq!(reading.humidity_pct, Some(55.0));
    }

    #[test]
    fn test_slots_cleared_after_emit() {
        let mut assembler = ReadingAssembler::new();
        let power = DeviceMessage::Power(PowerSample {
            consumption_wattage: 100.0,
            production_wattage: 0.0,
        });
        let environment = DeviceMessage::Environment(EnvironmentSample {
            temperature: 10.0,
            humidity: 80.0,
        });

        assert!(assembler.push(power, at()).is_none());
        assert!(assembler.push(environment, at()).is_some());
        assert!(assembler.push(power, at()).is_none());
    }

    #[test]
    fn test_negative_wattage_clamped() {
        let mut assembler = ReadingAssembler::new();
        let payload = br#"{"consumption_wattage": 190.0, "production_wattage": -12.5}"#;
        assert!(
            assembler
                .push_payload(POWER_TOPIC, payload, at())
                .unwrap()
                .is_none()
        );

        let payload = br#"{"temperature": 4.2, "humidity": 91.0}"#;
        let reading = assembler
            .push_payload(ENVIRONMENT_TOPIC, payload, at())
            .unwrap()
            .unwrap();
        assert_eq!(reading.production_w, 0.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            DeviceMessage::parse("sensor/unknown", b"{}"),
            Err(InsightError::UnknownTopic(_))
        ));
        assert!(matches!(
            DeviceMessage::parse(POWER_TOPIC, b"not json"),
            Err(InsightError::InvalidPayload(_))
        ));
    }
}
