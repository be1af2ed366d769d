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

use crate::errors::{FirebaseError, FirebaseResult};
use crate::record::parse_snapshot;
use insight_core::{HistoryQuery, RawReading};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Realtime database REST client
#[derive(Debug, Clone)]
pub struct FirebaseClient {
    database_url: String,
    auth: Option<String>,
    client: Client,
    /// No total timeout, streams stay open indefinitely
    stream_client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl FirebaseClient {
    /// Create a client for a database URL such as
    /// `https://example-default-rtdb.europe-west1.firebasedatabase.app`
    pub fn new(database_url: impl Into<String>, auth: Option<String>) -> FirebaseResult<Self> {
        let database_url = database_url.into().trim_end_matches('/').to_owned();
        if database_url.is_empty() {
            return Err(FirebaseError::ConfigError(
                "Database URL must not be empty".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FirebaseError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        let stream_client = Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                FirebaseError::ConfigError(format!("Failed to build streaming client: {e}"))
            })?;

        info!("🌐 Initializing database client: {}", database_url);
        Ok(Self {
            database_url,
            auth,
            client,
            stream_client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Set custom retry configuration
    #[must_use]
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// REST location of a site's records
    pub fn site_url(&self, site_id: &str) -> String {
        format!(
            "{}/houses/{}.json",
            self.database_url,
            urlencoding::encode(site_id)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    /// Fetch the most recent `limit` records of a site ordered by timestamp
    ///
    /// Returns `None` when the site does not exist or holds no records.
    pub async fn fetch_site(&self, query: &HistoryQuery) -> FirebaseResult<Option<Vec<RawReading>>> {
        let url = self.site_url(&query.site_id);
        let limit = query.limit.to_string();
        debug!(
            "🔍 [DB QUERY] Fetching last {} records of site {}",
            query.limit, query.site_id
        );
        trace!("   URL: {}", url);

        let response = self
            .retry_request(|| async {
                self.authorize(
                    self.client
                        .get(&url)
                        .query(&[("orderBy", "\"timestamp\""), ("limitToLast", limit.as_str())]),
                )
                .send()
                .await
            })
            .await?;

        let body = Self::check_status(response).await?.text().await?;
        let body: Value = serde_json::from_str(&body)?;
        if body.is_null() {
            debug!("📭 [DB RESULT] Site {} has no records", query.site_id);
            return Ok(None);
        }

        let readings = parse_snapshot(body);
        debug!(
            "✅ [DB RESULT] Site {}: {} readings",
            query.site_id,
            readings.len()
        );
        Ok((!readings.is_empty()).then_some(readings))
    }

    /// Open the change stream of a site
    pub async fn open_stream(&self, site_id: &str) -> FirebaseResult<Response> {
        let url = self.site_url(site_id);
        info!("📡 [DB STREAM] Opening change stream for site {}", site_id);

        let response = self
            .retry_request(|| async {
                self.authorize(
                    self.stream_client
                        .get(&url)
                        .header(header::ACCEPT, "text/event-stream"),
                )
                .send()
                .await
            })
            .await?;

        Self::check_status(response).await
    }

    /// Check that the database answers for the site
    pub async fn ping(&self, site_id: &str) -> FirebaseResult<bool> {
        let url = self.site_url(site_id);
        let response = self
            .authorize(self.client.get(&url).query(&[("shallow", "true")]))
            .send()
            .await?;
        Ok(Self::check_status(response).await.is_ok())
    }

    async fn check_status(response: Response) -> FirebaseResult<Response> {
        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [DB ERROR] Credentials rejected");
                Err(FirebaseError::Unauthorized)
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                error!("❌ [DB ERROR] Status {}: {}", status, message);
                Err(FirebaseError::ApiError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Retry transport failures with exponential backoff
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> FirebaseResult<Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(FirebaseError::HttpError(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn fetch_matcher(limit: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("orderBy".into(), "\"timestamp\"".into()),
            Matcher::UrlEncoded("limitToLast".into(), limit.into()),
        ])
    }

    #[tokio::test]
    async fn test_fetch_site_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/houses/house-1.json")
            .match_query(fetch_matcher("720"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "-A": {"consumption_wattage": 300.0, "production_wattage": 120.0,
                           "temperature": 21.0, "humidity": 55.0, "timestamp": 1_717_000_000},
                    "-B": {"consumption_wattage": 310.0, "production_wattage": 90.0,
                           "temperature": 20.5, "humidity": 57.0, "timestamp": 1_717_000_060}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = FirebaseClient::new(server.url(), None).unwrap();
        let readings = client
            .fetch_site(&HistoryQuery::new("house-1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(readings.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_site_sends_auth() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/houses/house-1.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("auth".into(), "secret".into()),
                Matcher::UrlEncoded("limitToLast".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let client = FirebaseClient::new(server.url(), Some("secret".to_owned())).unwrap();
        let result = client
            .fetch_site(&HistoryQuery::new("house-1").with_limit(5))
            .await
            .unwrap();

        assert!(result.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_site_unauthorized() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/houses/house-1.json")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error": "Permission denied"}"#)
            .create_async()
            .await;

        let client = FirebaseClient::new(server.url(), None).unwrap();
        let result = client.fetch_site(&HistoryQuery::new("house-1")).await;

        assert!(matches!(result, Err(FirebaseError::Unauthorized)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_site_server_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/houses/house-1.json")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = FirebaseClient::new(server.url(), None).unwrap();
        let result = client.fetch_site(&HistoryQuery::new("house-1")).await;

        assert!(matches!(
            result,
            Err(FirebaseError::ApiError { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_site_malformed_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/houses/house-1.json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let client = FirebaseClient::new(server.url(), None).unwrap();
        let result = client.fetch_site(&HistoryQuery::new("house-1")).await;

        assert!(matches!(result, Err(FirebaseError::JsonError(_))));
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_unreachable_host() {
        // Nothing listens on the discard port
        let client = FirebaseClient::new("http://127.0.0.1:9", None)
            .unwrap()
            .with_retry_config(2, Duration::from_millis(10));

        let result = client.fetch_site(&HistoryQuery::new("house-1")).await;
        assert!(matches!(result, Err(FirebaseError::HttpError(_))));
    }

    #[test]
    fn test_site_url_encoding() {
        let client = FirebaseClient::new("https://db.example.com/", None).unwrap();
        assert_eq!(
            client.site_url("house 7"),
            "https://db.example.com/houses/house%207.json"
        );
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(matches!(
            FirebaseClient::new("", None),
            Err(FirebaseError::ConfigError(_))
        ));
    }
}
