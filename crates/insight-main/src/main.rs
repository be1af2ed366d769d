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

mod config;
mod demo;

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use clap::Parser;
use config::{AppConfig, SourceKind};
use demo::DemoFeed;
use insight_core::{
    DayCycle, MemoryReadingSource, RandomSynthetic, ReadingSource, SensorSimulator,
    SourceAdapter, SystemClock,
};
use insight_firebase::{FirebaseClient, FirebaseReadingSource};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "fluxion-insight", version)]
#[command(about = "FluxION Insight - solar production and consumption dashboard", long_about = None)]
struct Args {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve simulated sensor data instead of the configured source
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let source_override = args.demo.then_some(SourceKind::Demo);
    let (config, origin) = AppConfig::load(args.config.as_deref(), source_override)?;

    // Respects RUST_LOG, falls back to the configured level
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.system.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("🚀 Starting FluxION Insight v{}", env!("CARGO_PKG_VERSION"));
    info!("✅ Loaded configuration from {origin}");
    info!("📋 Configuration Summary:");
    info!("   Source: {:?}", config.source.kind);
    info!("   Site: {}", config.source.site_id);
    info!("   History limit: {} readings", config.source.history_limit);
    info!("   Poll interval: {}s", config.dashboard.poll_interval_secs);
    info!("   Timezone: {}", config.dashboard.timezone);
    info!("   Listen: {}:{}", config.server.host, config.server.port);

    let adapter_config = config.adapter_config()?;
    let timezone = adapter_config.timezone;

    let (source, demo_feed): (Arc<dyn ReadingSource>, Option<JoinHandle<()>>) =
        match config.source.kind {
            SourceKind::Firebase => (Arc::new(firebase_source(&config)?), None),
            SourceKind::Demo => {
                let (source, feed) = demo_source(&config, timezone);
                (Arc::new(source), Some(feed))
            }
        };

    match source.health_check().await {
        Ok(true) => info!("✅ Source '{}' is reachable", source.name()),
        Ok(false) => warn!(
            "⚠️ Source '{}' did not answer the health check, dashboard will use demo data until it does",
            source.name()
        ),
        Err(e) => warn!("⚠️ Health check of source '{}' failed: {e:#}", source.name()),
    }

    let adapter = SourceAdapter::spawn(
        source,
        Arc::new(RandomSynthetic::from_entropy()),
        Arc::new(SystemClock),
        adapter_config,
    );

    let addr = config.listen_addr()?;
    let served = insight_web::start_web_server(adapter.controller(), addr, shutdown_signal()).await;

    if let Some(feed) = demo_feed {
        feed.abort();
    }
    adapter.shutdown().await;

    served.context("Web server failed")?;
    info!("👋 FluxION Insight stopped");
    Ok(())
}

fn firebase_source(config: &AppConfig) -> Result<FirebaseReadingSource> {
    let database_url = config
        .source
        .database_url
        .clone()
        .context("database_url is required for the firebase source")?;
    let client = FirebaseClient::new(database_url, config.source.auth_token.clone())
        .context("Failed to create database client")?;
    Ok(FirebaseReadingSource::new(client))
}

/// In-memory source seeded with simulated history and fed by a simulator task
fn demo_source(config: &AppConfig, timezone: Tz) -> (MemoryReadingSource, JoinHandle<()>) {
    let simulator = match config.source.demo_seconds_per_hour {
        Some(seconds_per_hour) => {
            SensorSimulator::new().with_cycle(DayCycle::Compressed { seconds_per_hour })
        }
        None => SensorSimulator::new(),
    };

    let source = MemoryReadingSource::new();
    let feed = DemoFeed::seed(
        source.clone(),
        simulator,
        config.source.site_id.clone(),
        timezone,
        Utc::now(),
    );
    let feed = tokio::spawn(feed.run(config.demo_interval()));
    (source, feed)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
