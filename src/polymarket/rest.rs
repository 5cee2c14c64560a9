//! REST API client for the Polymarket Gamma market-data API

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::messages::*;
use crate::common::errors::{ClientError, Result};
use crate::common::traits::EventSource;
use crate::config::types::{AppConfig, PolymarketConfig};

/// Statuses worth another attempt
const RETRY_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Query string filters. `None` values are dropped, so optional filters can
/// be passed straight through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a filter, replacing any earlier value for the same key
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.pairs.retain(|(k, _)| k != key);
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// Set a filter only when a value is present
    pub fn with_opt<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// REST client for the Gamma API
#[derive(Debug, Clone)]
pub struct GammaClient {
    /// HTTP client
    client: Client,
    /// Base URL for the Gamma API
    base_url: String,
    /// Retries after the first attempt
    max_retries: u32,
    /// Delay before the first retry; doubled each time
    retry_backoff: Duration,
}

impl GammaClient {
    /// Create a new client with default timeout and retry policy
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(15))
    }

    /// Create a new client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(20)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
        })
    }

    /// Build from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let PolymarketConfig { gamma_url, .. } = &config.polymarket;
        Ok(Self::with_timeout(gamma_url, config.settings.request_timeout())?
            .with_retry(config.settings.max_http_retries, config.settings.retry_backoff()))
    }

    /// Override the retry policy
    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// GET /events
    ///
    /// Accepts the documented filters: limit, offset, order, ascending,
    /// active, closed, archived, slug, tag_id, related_tags, ...
    #[instrument(skip(self))]
    pub async fn list_events(&self, params: &QueryParams) -> Result<Vec<GammaEvent>> {
        self.get_json("/events", params).await
    }

    /// GET /events/slug/{slug}
    #[instrument(skip(self))]
    pub async fn get_event_by_slug(&self, slug: &str) -> Result<GammaEvent> {
        self.get_by_slug(&format!("/events/slug/{}", slug), slug)
            .await
    }

    /// GET /markets
    ///
    /// Accepts the documented filters: limit, offset, order, ascending,
    /// active, closed, slug, tag_id, end_date_min, clob_token_ids, ...
    #[instrument(skip(self))]
    pub async fn list_markets(&self, params: &QueryParams) -> Result<Vec<GammaMarket>> {
        self.get_json("/markets", params).await
    }

    /// GET /markets/slug/{slug}
    #[instrument(skip(self))]
    pub async fn get_market_by_slug(&self, slug: &str) -> Result<GammaMarket> {
        self.get_by_slug(&format!("/markets/slug/{}", slug), slug)
            .await
    }

    /// GET /tags
    #[instrument(skip(self))]
    pub async fn list_tags(&self, params: &QueryParams) -> Result<Vec<GammaTag>> {
        self.get_json("/tags", params).await
    }

    /// GET /sports
    #[instrument(skip(self))]
    pub async fn list_sports(&self) -> Result<Vec<GammaSport>> {
        self.get_json("/sports", &QueryParams::new()).await
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    /// Stream every event matching `params`, one `limit`/`offset` page at a
    /// time. Stops on an empty page or a page shorter than `page_size`.
    pub fn events_stream(
        &self,
        page_size: u32,
        params: QueryParams,
    ) -> impl Stream<Item = Result<GammaEvent>> + '_ {
        paginate(page_size, params, move |page| async move {
            self.list_events(&page).await
        })
    }

    /// Stream every market matching `params`; see [`Self::events_stream`]
    pub fn markets_stream(
        &self,
        page_size: u32,
        params: QueryParams,
    ) -> impl Stream<Item = Result<GammaMarket>> + '_ {
        paginate(page_size, params, move |page| async move {
            self.list_markets(&page).await
        })
    }

    pub async fn collect_events(&self, page_size: u32, params: QueryParams) -> Result<Vec<GammaEvent>> {
        self.events_stream(page_size, params).try_collect().await
    }

    pub async fn collect_markets(
        &self,
        page_size: u32,
        params: QueryParams,
    ) -> Result<Vec<GammaMarket>> {
        self.markets_stream(page_size, params).try_collect().await
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    async fn get_by_slug<T: DeserializeOwned>(&self, path: &str, slug: &str) -> Result<T> {
        match self.get_json::<Option<T>>(path, &QueryParams::new()).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(ClientError::NotFound(slug.to_string())),
            Err(ClientError::Api { status: 404, .. }) => Err(ClientError::NotFound(slug.to_string())),
            Err(e) => Err(e),
        }
    }

    /// GET with retries on transport errors and retryable statuses
    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &QueryParams) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            debug!(%url, attempt, "GET");
            let result = self.client.get(&url).query(params.pairs()).send().await;

            let retry_reason = match result {
                Ok(response) if response.status().is_success() => {
                    let body = response.bytes().await?;
                    return Ok(serde_json::from_slice(&body)?);
                }
                Ok(response) if RETRY_STATUSES.contains(&response.status()) => {
                    let status = response.status();
                    if attempt >= self.max_retries {
                        return Err(Self::api_error(response).await);
                    }
                    status.to_string()
                }
                Ok(response) => return Err(Self::api_error(response).await),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    e.to_string()
                }
                Err(e) => return Err(e.into()),
            };

            let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
            warn!(%url, attempt, reason = %retry_reason, delay_ms = delay.as_millis() as u64, "retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn api_error(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.ok().filter(|b| !b.is_empty());
        ClientError::Api {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            body,
        }
    }
}

#[async_trait]
impl EventSource for GammaClient {
    async fn event_by_slug(&self, slug: &str) -> Result<GammaEvent> {
        self.get_event_by_slug(slug).await
    }
}

/// Offset pagination over any list endpoint
fn paginate<'a, T, F, Fut>(
    page_size: u32,
    params: QueryParams,
    fetch: F,
) -> impl Stream<Item = Result<T>> + 'a
where
    T: 'a,
    F: Fn(QueryParams) -> Fut + 'a,
    Fut: Future<Output = Result<Vec<T>>> + 'a,
{
    let page_size = u64::from(page_size.max(1));
    let start = params
        .get("offset")
        .and_then(|offset| offset.parse::<u64>().ok())
        .unwrap_or(0);

    stream::try_unfold(Some(start), move |offset| {
        let request = offset.map(|offset| {
            fetch(
                params
                    .clone()
                    .with("limit", page_size)
                    .with("offset", offset),
            )
        });
        async move {
            let (Some(offset), Some(request)) = (offset, request) else {
                return Ok::<_, ClientError>(None);
            };
            let page = request.await?;
            let next = (page.len() as u64 >= page_size).then_some(offset + page_size);
            Ok(Some((page, next)))
        }
    })
    .map_ok(|page| stream::iter(page.into_iter().map(Ok::<T, ClientError>)))
    .try_flatten()
}
