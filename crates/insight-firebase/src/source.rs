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

use crate::client::FirebaseClient;
use crate::errors::FirebaseError;
use crate::sse::{SseParser, StreamEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use insight_core::{HistoryQuery, RawReading, ReadingSource, SourceUpdate, Subscription};
use reqwest::Response;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

const SUBSCRIPTION_BUFFER: usize = 16;

/// Reading source backed by the realtime database
///
/// Subscriptions listen to the site's change stream and answer every
/// `put`/`patch` with a fresh bounded snapshot, so consumers always get the
/// complete current contents rather than deltas.
#[derive(Debug, Clone)]
pub struct FirebaseReadingSource {
    client: Arc<FirebaseClient>,
}

impl FirebaseReadingSource {
    pub fn new(client: FirebaseClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl ReadingSource for FirebaseReadingSource {
    async fn fetch(&self, query: &HistoryQuery) -> Result<Option<Vec<RawReading>>> {
        self.client
            .fetch_site(query)
            .await
            .with_context(|| format!("Failed to fetch readings of site {}", query.site_id))
    }

    async fn subscribe(&self, query: &HistoryQuery) -> Result<Subscription> {
        let response = self
            .client
            .open_stream(&query.site_id)
            .await
            .with_context(|| format!("Failed to open change stream of site {}", query.site_id))?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let worker = tokio::spawn(stream_worker(
            Arc::clone(&self.client),
            query.clone(),
            response,
            tx,
        ));

        Ok(Subscription::new(rx, Some(worker)))
    }

    async fn health_check(&self) -> Result<bool> {
        // Any site path answers when the database is reachable
        Ok(self.client.ping("healthcheck").await?)
    }

    fn name(&self) -> &str {
        "firebase"
    }
}

/// Read the change stream and turn change events into snapshots
async fn stream_worker(
    client: Arc<FirebaseClient>,
    query: HistoryQuery,
    response: Response,
    tx: mpsc::Sender<SourceUpdate>,
) {
    let mut body = response.bytes_stream();
    let mut parser = SseParser::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let error = FirebaseError::StreamError(e.to_string());
                warn!("⚠️ [DB STREAM] Stream of site {} failed: {error}", query.site_id);
                let _ = tx.send(SourceUpdate::Failed(error.to_string())).await;
                return;
            }
        };

        for event in parser.push(&chunk) {
            let update = match StreamEvent::from(&event) {
                StreamEvent::Put | StreamEvent::Patch => {
                    debug!("📡 [DB STREAM] {} on site {}", event.event, query.site_id);
                    SourceUpdate::from_fetch(client.fetch_site(&query).await.map_err(Into::into))
                }
                StreamEvent::KeepAlive => {
                    trace!("[DB STREAM] keep-alive");
                    continue;
                }
                StreamEvent::Cancel(reason) => {
                    let error = FirebaseError::StreamError(format!("cancelled by server: {reason}"));
                    warn!("⚠️ [DB STREAM] {error}");
                    let _ = tx.send(SourceUpdate::Failed(error.to_string())).await;
                    return;
                }
                StreamEvent::AuthRevoked => {
                    warn!("⚠️ [DB STREAM] Credentials revoked");
                    let _ = tx
                        .send(SourceUpdate::Failed(FirebaseError::Unauthorized.to_string()))
                        .await;
                    return;
                }
                StreamEvent::Unknown(kind) => {
                    trace!("[DB STREAM] Ignoring event '{kind}'");
                    continue;
                }
            };

            if tx.send(update).await.is_err() {
                return;
            }
        }
    }

    info!("📡 [DB STREAM] Stream of site {} closed", query.site_id);
}
