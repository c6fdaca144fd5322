// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Spanscope Client
//!
//! Async HTTP client for the read endpoints of the tracing API.

use crate::source::{SourceError, TraceSource};
use crate::types::*;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode, Url};
use spanscope_core::{Observation, TraceDetail, TraceSummary};
use std::time::Duration;

/// Page size requested when listing observations.
pub const OBSERVATIONS_PAGE_LIMIT: u32 = 100;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the tracing API
    pub url: String,
    /// Sent as `X-Project-Id` when set
    pub project_id: Option<String>,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            project_id: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for the tracing API.
///
/// # Example
///
/// ```no_run
/// use spanscope_client::{ClientConfig, SpanscopeClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = SpanscopeClient::new(ClientConfig::new("http://localhost:3000"))?;
///     let trace = client.get_trace("trace-123").await?;
///     println!("{}", trace.display_name());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SpanscopeClient {
    config: ClientConfig,
    base_url: Url,
    http_client: HttpClient,
}

impl SpanscopeClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url =
            Url::parse(&config.url).map_err(|e| SourceError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(config.url.clone()));
        }

        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(16)
            .build()?;

        Ok(Self {
            config,
            base_url,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build an endpoint URL; ids are percent-encoded as single segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.config.url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON resource. 404 maps to [`SourceError::NotFound`].
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;

        let mut request = self
            .http_client
            .get(url.clone())
            .header("Accept", "application/json");
        if let Some(project_id) = &self.config.project_id {
            request = request.header("X-Project-Id", project_id);
        }
        if !params.is_empty() {
            request = request.query(params);
        }

        tracing::trace!(url = %url, "GET");
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.path().to_string()));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Get a single trace.
    pub async fn get_trace(&self, trace_id: &str) -> Result<TraceDetail> {
        self.get(&["api", "public", "traces", trace_id], &[]).await
    }

    /// List traces with optional filters.
    pub async fn list_traces(&self, filter: Option<&TraceListFilter>) -> Result<Paginated<TraceSummary>> {
        let params = filter.map(TraceListFilter::to_params).unwrap_or_default();
        self.get(&["api", "public", "traces"], &params).await
    }

    /// All observations of a trace, as a flat list. Walks every page.
    pub async fn list_observations(&self, trace_id: &str) -> Result<Vec<Observation>> {
        let mut observations = Vec::new();
        let mut page = 1u32;

        loop {
            let batch: Paginated<Observation> = self
                .get(
                    &["api", "public", "observations"],
                    &[
                        ("traceId", trace_id.to_string()),
                        ("page", page.to_string()),
                        ("limit", OBSERVATIONS_PAGE_LIMIT.to_string()),
                    ],
                )
                .await?;

            let fetched = batch.data.len();
            observations.extend(batch.data);
            if fetched == 0 || page >= batch.meta.total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!(trace_id, pages = page, count = observations.len(), "listed observations");
        Ok(observations)
    }

    /// Get a single observation.
    pub async fn get_observation(&self, observation_id: &str) -> Result<Observation> {
        self.get(&["api", "public", "observations", observation_id], &[])
            .await
    }

    /// Check server health.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get(&["api", "public", "health"], &[]).await
    }
}

#[async_trait]
impl TraceSource for SpanscopeClient {
    async fn fetch_trace_detail(&self, trace_id: &str) -> Result<TraceDetail> {
        self.get_trace(trace_id).await
    }

    async fn fetch_observations(&self, trace_id: &str) -> Result<Vec<Observation>> {
        self.list_observations(trace_id).await
    }
}
