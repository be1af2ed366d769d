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

//! HTTP exposure of the dashboard state.
//!
//! Read-only JSON endpoints, a server-sent event stream that pushes every
//! state replacement, and a health check.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use insight_core::{AdapterController, DashboardState, Granularity};
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt, wrappers::WatchStream};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, trace, warn};

/// Application state for web handlers
#[derive(Clone, Debug)]
pub struct AppState {
    pub controller: AdapterController,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the router over the adapter's published state
pub fn router(controller: AdapterController) -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/series/{granularity}", get(series_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/stream", get(stream_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(AppState { controller })
}

/// Serve the router until `shutdown` resolves
///
/// # Errors
/// Returns error if the server fails to bind or serve
pub async fn start_web_server(
    controller: AdapterController,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(controller);

    info!("🌐 Starting web server on {addr}");
    info!("📱 Dashboard API: http://{addr}/api/dashboard");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("🌐 Web server stopped");
    Ok(())
}

/// Full dashboard snapshot
async fn dashboard_handler(State(app_state): State<AppState>) -> Json<DashboardState> {
    debug!("Dashboard requested");
    Json(app_state.controller.state().as_ref().clone())
}

/// One series by granularity ("day"/"hour", "week", "month")
async fn series_handler(
    State(app_state): State<AppState>,
    Path(granularity): Path<String>,
) -> Response {
    match granularity.parse::<Granularity>() {
        Ok(granularity) => {
            let state = app_state.controller.state();
            Json(state.series.get(granularity).clone()).into_response()
        }
        Err(e) => {
            debug!("Rejected series request: {e}");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn metrics_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.controller.state().metrics.clone())
}

/// Request an immediate fetch from the source
async fn refresh_handler(State(app_state): State<AppState>) -> StatusCode {
    if app_state.controller.refresh().await {
        info!("🔄 Manual refresh requested");
        StatusCode::ACCEPTED
    } else {
        warn!("⚠️ Refresh requested but the adapter is stopped");
        StatusCode::SERVICE_UNAVAILABLE
    }
}

fn state_event(state: &DashboardState) -> Event {
    Event::default()
        .event("update")
        .json_data(state)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// SSE stream pushing the dashboard on every state replacement
async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    trace!("SSE stream connected");

    let stream = WatchStream::new(app_state.controller.watch())
        .map(|state: Arc<DashboardState>| Ok::<_, Infallible>(state_event(&state)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Health check endpoint
async fn health_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let state = app_state.controller.state();
    if state.is_loading {
        (StatusCode::SERVICE_UNAVAILABLE, "LOADING")
    } else if state.is_synthetic() {
        (StatusCode::OK, "DEGRADED")
    } else {
        (StatusCode::OK, "OK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use insight_core::{
        AdapterConfig, AdapterHandle, FixedClock, HistoryQuery, MemoryReadingSource,
        RandomSynthetic, RawReading, ReadingSource, SourceAdapter, Subscription,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    /// Source that never answers
    #[derive(Debug)]
    struct SilentSource;

    #[async_trait::async_trait]
    impl ReadingSource for SilentSource {
        async fn fetch(&self, _query: &HistoryQuery) -> anyhow::Result<Option<Vec<RawReading>>> {
            std::future::pending().await
        }

        async fn subscribe(&self, _query: &HistoryQuery) -> anyhow::Result<Subscription> {
            std::future::pending().await
        }

        async fn health_check(&self) -> anyhow::Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    fn spawn_with(source: impl ReadingSource + 'static) -> AdapterHandle {
        SourceAdapter::spawn(
            Arc::new(source),
            Arc::new(RandomSynthetic::seeded(3)),
            Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap(),
            )),
            AdapterConfig::new("house-1").with_poll_interval(Duration::from_secs(3600)),
        )
    }

    fn live_source() -> MemoryReadingSource {
        let source = MemoryReadingSource::new();
        let ts = Utc
            .with_ymd_and_hms(2025, 6, 10, 11, 30, 0)
            .unwrap()
            .timestamp_millis();
        source.replace("house-1", vec![RawReading::new(ts, 2500.0, 900.0)]);
        source
    }

    async fn ready(handle: &AdapterHandle) {
        let mut rx = handle.watch();
        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.borrow_and_update().is_loading {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    async fn get(handle: &AdapterHandle, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router(handle.controller())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_dashboard_endpoint() {
        let handle = spawn_with(live_source());
        ready(&handle).await;

        let (status, body) = get(&handle, "/api/dashboard").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["isLoading"], false);
        assert!(json["error"].is_null());
        assert_eq!(json["series"]["hour"]["points"].as_array().unwrap().len(), 24);
        assert_eq!(json["series"]["week"]["points"].as_array().unwrap().len(), 7);
        assert_eq!(json["series"]["month"]["points"].as_array().unwrap().len(), 30);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_series_endpoint() {
        let handle = spawn_with(live_source());
        ready(&handle).await;

        let (status, body) = get(&handle, "/api/series/day").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["granularity"], "hour");
        assert_eq!(json["points"][11]["label"], "11:00");
        assert_eq!(json["points"][11]["productionKwh"], 2.5);

        let (status, _) = get(&handle, "/api/series/year").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let handle = spawn_with(live_source());
        ready(&handle).await;

        let (status, body) = get(&handle, "/api/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["peakHour"], 11);
        assert_eq!(json["peakProduction"], 2.5);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_health_states() {
        let handle = spawn_with(live_source());
        ready(&handle).await;
        let (status, body) = get(&handle, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
        handle.shutdown().await;

        let handle = spawn_with(MemoryReadingSource::new());
        ready(&handle).await;
        let (status, body) = get(&handle, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"DEGRADED");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_health_loading() {
        let handle = spawn_with(SilentSource);
        let (status, body) = get(&handle, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, b"LOADING");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_refresh_accepted() {
        let handle = spawn_with(live_source());
        let response = router(handle.controller())
            .oneshot(
                Request::post("/api/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_sends_update_event() {
        let handle = spawn_with(live_source());
        ready(&handle).await;

        let response = router(handle.controller())
            .oneshot(Request::get("/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let mut body = response.into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8_lossy(&chunk);
        assert!(text.starts_with("event: update"));
        assert!(text.contains("\"isLoading\":false"));

        handle.shutdown().await;
    }
}
