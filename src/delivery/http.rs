// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP delivery to the collector
//!
//! Snapshots are posted as a JSON object to the collector ingestion endpoint.
//! Only `201 Created` counts as success.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;

use super::SnapshotSink;
use crate::config::CollectorConfig;
use crate::error::DeliveryError;
use crate::snapshot::Snapshot;

/// Posts snapshots to the collector over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSink {
    /// Full ingestion URL, e.g. `http://localhost:5000/data`
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSnapshotSink {
    /// Create a sink for `url`.
    ///
    /// ### Errors
    ///
    /// Returns [`DeliveryError::InvalidUrl`] unless `url` is an absolute
    /// http(s) URL.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|e| DeliveryError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DeliveryError::InvalidUrl {
                url,
                reason: "must start with http:// or https://".to_string(),
            });
        }

        Ok(Self {
            url,
            client: reqwest::Client::new(),
            timeout,
        })
    }

    pub fn from_config(config: &CollectorConfig) -> Result<Self, DeliveryError> {
        Self::new(config.ingest_url(), Duration::from_millis(config.timeout_ms))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSink for HttpSnapshotSink {
    async fn submit(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(snapshot)?;
        debug!("Posting {} readings to {}", snapshot.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::CREATED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            url: self.url.clone(),
            status: status.as_u16(),
            body,
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
