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

use anyhow::{Context, Result};
use chrono_tz::Tz;
use insight_core::{AdapterConfig, DEFAULT_HISTORY_LIMIT, parse_timezone};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

const MAX_HISTORY_LIMIT: usize = 10_000;

/// Where readings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Realtime database over REST and its change stream
    #[default]
    Firebase,
    /// In-process simulated sensors
    Demo,
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firebase" => Ok(Self::Firebase),
            "demo" => Ok(Self::Demo),
            other => anyhow::bail!("Unknown source kind '{other}' (expected firebase or demo)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Database URL, required for the firebase source
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_site_id")]
    pub site_id: String,

    /// Most recent readings requested per fetch
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Seconds between simulated readings in demo mode
    #[serde(default = "default_demo_interval_secs")]
    pub demo_interval_secs: u64,

    /// Compress the simulated day so one hour lasts this many seconds
    #[serde(default)]
    pub demo_seconds_per_hour: Option<u32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            database_url: None,
            auth_token: None,
            site_id: default_site_id(),
            history_limit: default_history_limit(),
            demo_interval_secs: default_demo_interval_secs(),
            demo_seconds_per_hour: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// IANA timezone name used for bucket keys
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub system: SystemConfig,
}

fn default_site_id() -> String {
    "house-1".to_owned()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_demo_interval_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8099
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl AppConfig {
    /// Load configuration from an explicit file, `config.toml`, `config.json`
    /// or the environment, in that order
    ///
    /// `source` overrides the configured source kind before validation.
    /// Runs before logging is installed, so the origin of the configuration
    /// is returned alongside it for the caller to report.
    pub fn load(path: Option<&Path>, source: Option<SourceKind>) -> Result<(Self, String)> {
        let (mut config, origin) = Self::read(path)?;
        if let Some(kind) = source {
            config.source.kind = kind;
        }
        config.validate()?;
        Ok((config, origin))
    }

    fn read(path: Option<&Path>) -> Result<(Self, String)> {
        if let Some(path) = path {
            return Ok((Self::from_file(path)?, path.display().to_string()));
        }

        for candidate in ["config.toml", "config.json"] {
            let path = Path::new(candidate);
            if path.exists() {
                return Ok((Self::from_file(path)?, candidate.to_owned()));
            }
        }

        Ok((
            Self::from_env(),
            "defaults with environment overrides".to_owned(),
        ))
    }

    /// Parse a TOML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
        }
    }

    fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `INSIGHT_*` variables read through `lookup`
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("INSIGHT_DATABASE_URL") {
            config.source.database_url = Some(url);
        }
        if let Some(token) = lookup("INSIGHT_AUTH_TOKEN") {
            config.source.auth_token = Some(token);
        }
        if let Some(site_id) = lookup("INSIGHT_SITE_ID") {
            config.source.site_id = site_id;
        }
        if let Some(kind) = lookup("INSIGHT_SOURCE")
            && let Ok(kind) = kind.parse()
        {
            config.source.kind = kind;
        }
        if let Some(interval) = lookup("INSIGHT_POLL_INTERVAL_SECS")
            && let Ok(secs) = interval.parse::<u64>()
        {
            config.dashboard.poll_interval_secs = secs;
        }
        if let Some(timezone) = lookup("INSIGHT_TIMEZONE") {
            config.dashboard.timezone = timezone;
        }
        if let Some(port) = lookup("INSIGHT_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.server.port = port;
        }
        if let Some(level) = lookup("INSIGHT_LOG_LEVEL") {
            config.system.log_level = level;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.site_id.trim().is_empty() {
            anyhow::bail!("site_id cannot be empty");
        }

        if self.source.kind == SourceKind::Firebase {
            match self.source.database_url.as_deref().map(str::trim) {
                None | Some("") => {
                    anyhow::bail!("database_url is required for the firebase source")
                }
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    anyhow::bail!("database_url must be an http(s) URL, got '{url}'")
                }
                Some(_) => {}
            }
        }

        if self.source.history_limit == 0 || self.source.history_limit > MAX_HISTORY_LIMIT {
            anyhow::bail!(
                "history_limit must be between 1 and {MAX_HISTORY_LIMIT}, got {}",
                self.source.history_limit
            );
        }

        if self.source.kind == SourceKind::Demo {
            if self.source.demo_interval_secs == 0 {
                anyhow::bail!("demo_interval_secs must be at least 1 second");
            }
            if self.source.demo_seconds_per_hour == Some(0) {
                anyhow::bail!("demo_seconds_per_hour must be at least 1 second");
            }
        }

        if self.dashboard.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1 second");
        }

        self.timezone()?;
        self.listen_addr()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.dashboard.timezone).context("Invalid dashboard timezone")
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    self.server.host, self.server.port
                )
            })
    }

    /// Settings of the source adapter
    pub fn adapter_config(&self) -> Result<AdapterConfig> {
        Ok(AdapterConfig::new(self.source.site_id.clone())
            .with_limit(self.source.history_limit)
            .with_poll_interval(Duration::from_secs(self.dashboard.poll_interval_secs))
            .with_timezone(self.timezone()?))
    }

    pub fn demo_interval(&self) -> Duration {
        Duration::from_secs(self.source.demo_interval_secs)
    }
}
