// Echoir - Music Catalog Downloader
// Copyright (C) 2025 Echoir contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! HTTP client for the catalog service
//!
//! Thin wrapper around reqwest with the configuration the resolver needs:
//! base URL, timeout, bounded retry on transient failures, and the
//! authorization header the catalog expects on every request.

use crate::error::{EchoirError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("echoir-core/", env!("CARGO_PKG_VERSION"));

/// Catalog client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    pub auth_token: Option<String>,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Duration,
    max_retries: u32,
    user_agent: String,
    auth_token: Option<String>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            auth_token: None,
        }
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn auth_token<S: Into<String>>(mut self, token: S) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let base_url = self
            .base_url
            .ok_or_else(|| EchoirError::InvalidInput("catalog base URL is required".to_string()))?;

        // Validate early so a bad configuration fails at construction, not
        // on the first request
        Url::parse(&base_url)
            .map_err(|e| EchoirError::InvalidInput(format!("Invalid catalog URL: {}", e)))?;

        Ok(ClientConfig {
            base_url,
            timeout: self.timeout,
            max_retries: self.max_retries,
            user_agent: self.user_agent,
            auth_token: self.auth_token,
        })
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client for the catalog service
pub struct CatalogClient {
    client: Client,
    config: ClientConfig,
}

impl CatalogClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| EchoirError::InvalidInput(format!("Invalid user agent: {}", e)))?,
        );
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| EchoirError::InvalidInput(format!("Invalid auth token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Raw reqwest handle, for requests outside the catalog (cover art)
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// GET a JSON endpoint with query parameters, retrying transient
    /// failures up to the configured bound with exponential backoff.
    ///
    /// Non-success statuses are surfaced to the caller unchanged so it can
    /// map them onto its own error domain (e.g. 404 → quality unavailable).
    pub async fn get_with_query<T, Q>(&self, endpoint: &str, query: &Q) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint_url(endpoint)?;
        let mut attempt = 0u32;

        loop {
            let result = self.client.get(url.clone()).query(query).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body: T = response.json().await.map_err(|e| {
                            EchoirError::invalid_response(
                                format!("Failed to decode {}: {}", endpoint, e),
                                None,
                            )
                        })?;
                        return Ok(ApiResponse { status, body: Some(body) });
                    }

                    if status.is_server_error() && attempt < self.config.max_retries {
                        attempt += 1;
                        let backoff = Duration::from_secs(2u64.pow(attempt.min(5)));
                        warn!(endpoint, %status, attempt, "catalog request failed, retrying");
                        sleep(backoff).await;
                        continue;
                    }

                    debug!(endpoint, %status, "catalog returned non-success status");
                    return Ok(ApiResponse { status, body: None });
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect();
                    if transient && attempt < self.config.max_retries {
                        attempt += 1;
                        let backoff = Duration::from_secs(2u64.pow(attempt.min(5)));
                        warn!(endpoint, error = %e, attempt, "catalog unreachable, retrying");
                        sleep(backoff).await;
                        continue;
                    }
                    return Err(EchoirError::catalog_unreachable(e.to_string(), transient));
                }
            }
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        let base = format!("{}/", self.config.base_url.trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|u| u.join(endpoint.trim_start_matches('/')))
            .map_err(|e| EchoirError::InvalidInput(format!("Invalid endpoint {}: {}", endpoint, e)))
    }
}

/// Decoded response body plus the status it arrived with
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub body: Option<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        assert!(ClientConfig::builder().build().is_err());
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let result = ClientConfig::builder().base_url("not a url").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder()
            .base_url("https://catalog.example.com/api")
            .build()
            .unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        let config = ClientConfig::builder()
            .base_url("https://catalog.example.com/api/")
            .build()
            .unwrap();
        let client = CatalogClient::new(config).unwrap();

        let url = client.endpoint_url("/playback").unwrap();
        assert_eq!(url.as_str(), "https://catalog.example.com/api/playback");
    }
}
