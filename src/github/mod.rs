//! Hosting API client
//!
//! This module issues the two outbound calls the collector needs:
//! - Trending search ordered by stars
//! - Per-project detail lookup by numeric id
//!
//! Detail calls are spaced by a fixed interval with `governor`, and the last
//! observed rate-limit window is kept so an exhausted window is waited out
//! before the next call. The client never persists anything.

pub mod rate_limit;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, Response,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::GithubConfig;
use crate::models::ProjectSummary;
use crate::utils::error::TransportError;

pub use rate_limit::RateLimitInfo;

/// Media type of the v3 JSON API
pub const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// Outbound calls the collector depends on
#[async_trait]
pub trait ProjectApi: Send + Sync {
    /// One search request for projects above `min_stars`, most stars first
    async fn search_trending(
        &self,
        min_stars: u64,
        page_size: u32,
    ) -> Result<Vec<ProjectSummary>, TransportError>;

    /// Current metrics for one project
    async fn get_project_detail(&self, project_id: i64) -> Result<ProjectSummary, TransportError>;

    /// Last observed rate-limit window, if any response carried one
    fn rate_limit(&self) -> Option<RateLimitInfo> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<ProjectSummary>,
}

/// `reqwest`-backed implementation of [`ProjectApi`]
pub struct GithubClient {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// API root without trailing slash
    base_url: String,

    /// Default headers sent with every request
    headers: HeaderMap,

    /// Spaces detail calls; `None` when the interval is zero
    detail_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,

    /// Window from the most recent response
    last_rate_limit: Mutex<Option<RateLimitInfo>>,

    warn_threshold: u64,
    max_rate_limit_wait: Duration,
}

impl GithubClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidUrl` for an unparseable base URL or
    /// header value, and `TransportError::Http` if the HTTP client cannot be
    /// created.
    pub fn new(config: &GithubConfig) -> Result<Self, TransportError> {
        let base_url = normalize_base_url(&config.api_base_url)?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .gzip(true)
            .build()?;

        let detail_limiter =
            Quota::with_period(config.detail_interval()).map(RateLimiter::direct);

        Ok(Self {
            client,
            base_url,
            headers: build_headers(&config.user_agent, config.token.as_deref())?,
            detail_limiter,
            last_rate_limit: Mutex::new(None),
            warn_threshold: config.rate_limit_warn_threshold,
            max_rate_limit_wait: config.max_rate_limit_wait(),
        })
    }

    /// Create a client against a custom base URL for testing
    pub fn with_base_url(base_url: &str, detail_interval: Duration) -> Result<Self, TransportError> {
        let config = GithubConfig {
            api_base_url: base_url.to_string(),
            detail_interval_ms: u64::try_from(detail_interval.as_millis()).unwrap_or(u64::MAX),
            ..GithubConfig::default()
        };
        Self::new(&config)
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Wait out an exhausted rate-limit window
    async fn respect_rate_limit(&self) {
        let wait = self
            .rate_limit()
            .map(|info| info.wait_duration(chrono::Utc::now(), self.max_rate_limit_wait))
            .unwrap_or(Duration::ZERO);

        if !wait.is_zero() {
            tracing::warn!(
                wait_secs = wait.as_secs(),
                "Rate limit exhausted, waiting for reset"
            );
            tokio::time::sleep(wait).await;
        }
    }

    fn record_rate_limit(&self, headers: &HeaderMap) {
        let Some(info) = RateLimitInfo::from_headers(headers) else {
            return;
        };

        tracing::info!(remaining = info.remaining, limit = ?info.limit, "API rate limit");
        if info.remaining < self.warn_threshold {
            tracing::warn!(
                remaining = info.remaining,
                reset = ?info.reset,
                "API rate limit nearly exhausted"
            );
        }
        crate::metrics::set_rate_limit_remaining(info.remaining);

        if let Ok(mut last) = self.last_rate_limit.lock() {
            *last = Some(info);
        }
    }

    /// Send a GET, track the rate limit and decode a JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, TransportError> {
        self.respect_rate_limit().await;

        let started = Instant::now();
        let result = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .query(query)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                crate::metrics::record_api_request(endpoint, 0, started.elapsed().as_secs_f64());
                if e.is_timeout() {
                    return Err(TransportError::Timeout {
                        url: url.to_string(),
                    });
                }
                return Err(TransportError::Http(e));
            }
        };

        let status = response.status();
        crate::metrics::record_api_request(
            endpoint,
            status.as_u16(),
            started.elapsed().as_secs_f64(),
        );
        self.record_rate_limit(response.headers());

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                rate_limit_remaining: rate_limit::remaining_from_headers(response.headers()),
            });
        }

        decode_json(response).await
    }
}

fn normalize_base_url(raw: &str) -> Result<String, TransportError> {
    let trimmed = raw.trim().trim_end_matches('/');
    url::Url::parse(trimmed).map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))?;
    Ok(trimmed.to_string())
}

/// Build request headers
fn build_headers(user_agent: &str, token: Option<&str>) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .map_err(|_| TransportError::InvalidUrl(format!("invalid user agent: {user_agent}")))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|_| TransportError::InvalidUrl("invalid token characters".to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}

#[async_trait]
impl ProjectApi for GithubClient {
    async fn search_trending(
        &self,
        min_stars: u64,
        page_size: u32,
    ) -> Result<Vec<ProjectSummary>, TransportError> {
        let url = format!("{}/search/repositories", self.base_url);
        let query = [
            ("q", format!("stars:>{min_stars}")),
            ("sort", "stars".to_string()),
            ("order", "desc".to_string()),
            ("per_page", page_size.to_string()),
        ];

        let response: SearchResponse = self.get_json("search", &url, &query).await?;
        tracing::debug!(count = response.items.len(), min_stars, "Trending search returned");
        Ok(response.items)
    }

    async fn get_project_detail(&self, project_id: i64) -> Result<ProjectSummary, TransportError> {
        if let Some(limiter) = &self.detail_limiter {
            limiter.until_ready().await;
        }

        let url = format!("{}/repositories/{project_id}", self.base_url);
        self.get_json("detail", &url, &[]).await
    }

    fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.last_rate_limit.lock().ok().and_then(|last| *last)
    }
}
