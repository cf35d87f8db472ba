use crate::cache::TtlCache;
use crate::normalizers::normalize_market_chart;
use crate::types::*;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const PUBLIC_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";

/// Internal health tracking for API-free health checks
struct HealthTracker {
    /// Timestamp of last successful request (millis since epoch)
    last_success_ms: AtomicU64,
    /// Timestamp of last failed request (millis since epoch)
    last_failure_ms: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    /// Last known latency in ms
    last_latency_ms: AtomicU64,
}

impl HealthTracker {
    fn new() -> Self {
        Self {
            last_success_ms: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            last_latency_ms: AtomicU64::new(0),
        }
    }

    fn record_success(&self, latency_ms: u64) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_success_ms.store(now_ms, Ordering::Relaxed);
        self.last_latency_ms.store(latency_ms, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_failure_ms.store(now_ms, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    fn is_healthy(&self) -> bool {
        let last_success = self.last_success_ms.load(Ordering::Relaxed);
        let last_failure = self.last_failure_ms.load(Ordering::Relaxed);

        // Healthy if: had at least one success AND (no failures OR last success > last failure)
        last_success > 0 && (last_failure == 0 || last_success > last_failure)
    }

    fn success_rate(&self) -> f64 {
        let successes = self.success_count.load(Ordering::Relaxed);
        let failures = self.failure_count.load(Ordering::Relaxed);
        let total = successes + failures;
        if total == 0 {
            return 1.0; // No requests yet, assume healthy
        }
        successes as f64 / total as f64
    }
}

/// CoinGecko API client
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: tokio::sync::Semaphore,
    last_request: tokio::sync::Mutex<Instant>,
    health_tracker: HealthTracker,
    /// Caller-owned history cache, keyed by `"{token}:{days}"`
    history_cache: Option<Arc<TtlCache<PriceSeries>>>,
}

impl CoinGeckoClient {
    /// Free tier: ~10-30 calls/minute
    /// Pro tier: higher limits with API key
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| DataRetrievalError::ApiError(format!("HTTP client: {}", e)))?;

        // Free tier: allow 1 concurrent request to stay under rate limit
        let permits = if api_key.is_some() { 5 } else { 1 };
        let base_url = if api_key.is_some() {
            PRO_BASE_URL
        } else {
            PUBLIC_BASE_URL
        };

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
            rate_limiter: tokio::sync::Semaphore::new(permits),
            last_request: tokio::sync::Mutex::new(Instant::now() - Duration::from_secs(10)),
            health_tracker: HealthTracker::new(),
            history_cache: None,
        })
    }

    /// Point the client at another API root (mirrors, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Serve repeated history requests from `cache` while fresh
    pub fn with_history_cache(mut self, cache: Arc<TtlCache<PriceSeries>>) -> Self {
        self.history_cache = Some(cache);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build request with optional API key
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut req = self.client.get(&url);

        if let Some(key) = &self.api_key {
            req = req.header("x-cg-pro-api-key", key);
        }

        req
    }

    /// Per-request timeout (10 seconds for individual API calls)
    const REQUEST_TIMEOUT_SECS: u64 = 10;

    /// Rate-limited request wrapper with per-request timeout and retry on 429
    ///
    /// HTTP 404 maps to `AssetNotFound(endpoint)`; callers rewrite it with the
    /// asset they asked for.
    async fn rate_limited_request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T> {
        let request_start = Instant::now();

        // Try up to 2 times (initial + 1 retry on rate limit)
        for attempt in 0..2 {
            let _permit = self.rate_limiter.acquire().await.map_err(|e| {
                self.health_tracker.record_failure();
                DataRetrievalError::ApiError(e.to_string())
            })?;

            // Ensure minimum delay between requests (free tier friendly)
            {
                let mut last = self.last_request.lock().await;
                let elapsed = last.elapsed();
                if elapsed < Duration::from_millis(100) {
                    tokio::time::sleep(Duration::from_millis(100) - elapsed).await;
                }
                *last = Instant::now();
            }

            let request_future = self.build_request(endpoint).send();
            let response = match tokio::time::timeout(
                Duration::from_secs(Self::REQUEST_TIMEOUT_SECS),
                request_future,
            )
            .await
            {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    self.health_tracker.record_failure();
                    return Err(DataRetrievalError::ApiError(e.to_string()));
                }
                Err(_) => {
                    self.health_tracker.record_failure();
                    return Err(DataRetrievalError::ApiError(format!(
                        "CoinGecko request to {} timed out after {}s",
                        endpoint,
                        Self::REQUEST_TIMEOUT_SECS
                    )));
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());

                if attempt == 0 {
                    let wait_secs = retry_after.unwrap_or(60).min(120); // Cap at 2 minutes
                    warn!(
                        "CoinGecko rate limited, waiting {} seconds before retry",
                        wait_secs
                    );
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }

                self.health_tracker.record_failure();
                return Err(DataRetrievalError::RateLimit {
                    source_name: "coingecko".to_string(),
                    retry_after,
                });
            }

            if status == StatusCode::NOT_FOUND {
                // The API answered; the resource just does not exist
                let latency_ms = request_start.elapsed().as_millis() as u64;
                self.health_tracker.record_success(latency_ms);
                return Err(DataRetrievalError::AssetNotFound(endpoint.to_string()));
            }

            if !status.is_success() {
                self.health_tracker.record_failure();
                let text = response.text().await.unwrap_or_default();
                return Err(DataRetrievalError::ApiError(format!(
                    "CoinGecko API error ({}): {}",
                    status, text
                )));
            }

            let latency_ms = request_start.elapsed().as_millis() as u64;
            self.health_tracker.record_success(latency_ms);

            return response.json::<T>().await.map_err(|e| {
                self.health_tracker.record_failure();
                DataRetrievalError::InvalidResponse(e.to_string())
            });
        }

        Err(DataRetrievalError::ApiError(
            "Unexpected retry loop exit".to_string(),
        ))
    }

    /// Resolve a ticker symbol ("SOL") to a CoinGecko coin id ("solana")
    pub async fn coin_id_for_symbol(&self, symbol: &str) -> Result<String> {
        // Common mappings for speed (avoid API call)
        let static_mappings: HashMap<&str, &str> = [
            ("BTC", "bitcoin"),
            ("ETH", "ethereum"),
            ("SOL", "solana"),
            ("USDC", "usd-coin"),
            ("USDT", "tether"),
            ("BNB", "binancecoin"),
            ("XRP", "ripple"),
            ("ADA", "cardano"),
            ("AVAX", "avalanche-2"),
            ("DOGE", "dogecoin"),
            ("MATIC", "matic-network"),
        ]
        .iter()
        .cloned()
        .collect();

        if let Some(&id) = static_mappings.get(symbol.to_uppercase().as_str()) {
            return Ok(id.to_string());
        }

        let endpoint = format!("/search?query={}", symbol);
        let response: SearchResponse = self.rate_limited_request(&endpoint).await?;

        response
            .coins
            .into_iter()
            .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
            .map(|c| c.id)
            .ok_or_else(|| DataRetrievalError::AssetNotFound(symbol.to_string()))
    }

    /// Daily USD prices for the last `days` days
    ///
    /// Uses `/coins/{id}/market_chart` which returns
    /// `{"prices": [[timestamp_ms, price], ...], ...}`. A payload without
    /// prices is "no data" and yields an empty series.
    pub async fn fetch_prices(&self, token_id: &str, days: u32) -> Result<PriceSeries> {
        let token_id = token_id.trim().to_lowercase();
        let cache_key = format!("{}:{}", token_id, days);

        if let Some(cache) = &self.history_cache {
            if let Some(series) = cache.get(&cache_key).await {
                debug!("History cache hit for {}", cache_key);
                return Ok(series);
            }
        }

        let endpoint = format!(
            "/coins/{}/market_chart?vs_currency=usd&days={}&interval=daily",
            token_id, days
        );

        let response: MarketChartResponse = self
            .rate_limited_request(&endpoint)
            .await
            .map_err(|e| not_found_as(e, &token_id))?;

        let series = normalize_market_chart(&token_id, response.prices);

        if series.is_empty() {
            warn!("CoinGecko returned no price data for {}", token_id);
        } else if let Some(cache) = &self.history_cache {
            cache.insert(cache_key, series.clone()).await;
        }

        Ok(series)
    }

    /// Get current price for an asset symbol
    pub async fn get_price(&self, asset: &str, quote: &str) -> Result<SpotPrice> {
        let coin_id = self.coin_id_for_symbol(asset).await?;
        let vs_currency = quote.to_lowercase();

        let endpoint = format!(
            "/simple/price?ids={}&vs_currencies={}",
            coin_id, vs_currency
        );

        let response: serde_json::Value = self.rate_limited_request(&endpoint).await?;

        let data = response.get(&coin_id).ok_or_else(|| {
            DataRetrievalError::AssetNotFound(format!("{} ({})", asset, coin_id))
        })?;

        // JSON numbers, so the f64 intermediate is unavoidable
        let price = data
            .get(&vs_currency)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| DataRetrievalError::InvalidResponse("Missing price data".to_string()))?;

        Ok(SpotPrice {
            symbol: format!("{}/{}", asset.to_uppercase(), quote.to_uppercase()),
            price: Decimal::try_from(price)
                .map_err(|e| DataRetrievalError::InvalidResponse(e.to_string()))?,
            source: "coingecko".to_string(),
            timestamp: Utc::now(),
            confidence: Some(0.85), // CoinGecko is reliable but not real-time
        })
    }

    /// Token metadata from `/coins/{id}`
    ///
    /// Unknown tokens are `AssetNotFound`. Substituting another token is the
    /// caller's decision (see [`crate::fallback::TokenFallback`]).
    pub async fn get_token_info(&self, token_id: &str) -> Result<TokenInfo> {
        let token_id = token_id.trim().to_lowercase();
        let endpoint = format!(
            "/coins/{}?localization=false&tickers=false&community_data=false&developer_data=false",
            token_id
        );

        let detail: CoinDetailResponse = self
            .rate_limited_request(&endpoint)
            .await
            .map_err(|e| not_found_as(e, &token_id))?;

        if let Some(error) = detail.error {
            debug!("CoinGecko error body for {}: {}", token_id, error);
            return Err(DataRetrievalError::AssetNotFound(token_id));
        }

        let links = detail.links.unwrap_or_default();
        let market = detail.market_data.unwrap_or_default();

        Ok(TokenInfo {
            id: detail.id.unwrap_or_else(|| token_id.clone()),
            name: detail.name.unwrap_or_else(|| "Unknown".to_string()),
            symbol: detail.symbol.unwrap_or_default().to_uppercase(),
            image: detail.image.and_then(|i| i.large),
            website: links.homepage.into_iter().find(|h| !h.is_empty()),
            twitter: links.twitter_screen_name.filter(|s| !s.is_empty()),
            reddit: links.subreddit_url.filter(|s| !s.is_empty()),
            fdv_usd: usd_value(&market.fully_diluted_valuation),
            max_supply: market.max_supply,
            market_cap_usd: usd_value(&market.market_cap),
        })
    }

    /// Get health status using internal metrics (no API call)
    pub async fn health(&self) -> SourceHealth {
        let last_success_ms = self.health_tracker.last_success_ms.load(Ordering::Relaxed);
        let last_success = if last_success_ms > 0 {
            DateTime::from_timestamp_millis(last_success_ms as i64)
        } else {
            None
        };

        let is_healthy = self.health_tracker.is_healthy();
        let success_rate = self.health_tracker.success_rate();
        let latency = self.health_tracker.last_latency_ms.load(Ordering::Relaxed);

        SourceHealth {
            source: "coingecko".to_string(),
            is_healthy,
            last_success,
            last_error: if is_healthy {
                None
            } else {
                Some("Recent failures detected".to_string())
            },
            success_rate_24h: success_rate,
            avg_latency_ms: latency,
        }
    }

    pub fn name(&self) -> &str {
        "coingecko"
    }
}

fn not_found_as(err: DataRetrievalError, token_id: &str) -> DataRetrievalError {
    match err {
        DataRetrievalError::AssetNotFound(_) => DataRetrievalError::AssetNotFound(token_id.to_string()),
        other => other,
    }
}

fn usd_value(values: &Option<HashMap<String, Option<f64>>>) -> Option<f64> {
    values.as_ref().and_then(|m| m.get("usd").copied().flatten())
}

// Response types for CoinGecko API
#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    coins: Vec<SearchCoin>,
}

#[derive(Debug, serde::Deserialize)]
struct SearchCoin {
    id: String,
    symbol: String,
}

#[derive(Debug, serde::Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, Option<f64>)>,
}

#[derive(Debug, serde::Deserialize)]
struct CoinDetailResponse {
    id: Option<String>,
    name: Option<String>,
    symbol: Option<String>,
    image: Option<CoinImage>,
    links: Option<CoinLinks>,
    market_data: Option<CoinMarketData>,
    error: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CoinImage {
    large: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct CoinLinks {
    #[serde(default)]
    homepage: Vec<String>,
    twitter_screen_name: Option<String>,
    subreddit_url: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct CoinMarketData {
    fully_diluted_valuation: Option<HashMap<String, Option<f64>>>,
    market_cap: Option<HashMap<String, Option<f64>>>,
    max_supply: Option<f64>,
}

#[async_trait::async_trait]
impl PriceFeed for CoinGeckoClient {
    async fn fetch_prices(&self, token_id: &str, days: u32) -> Result<PriceSeries> {
        CoinGeckoClient::fetch_prices(self, token_id, days).await
    }

    async fn health(&self) -> SourceHealth {
        CoinGeckoClient::health(self).await
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
