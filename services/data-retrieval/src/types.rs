use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// True for a usable market price: finite and strictly positive
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// One historical price observation
///
/// `price` is kept as `f64` because feeds can deliver nulls, zeros or
/// non-finite values; those are preserved and handled by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }

    /// False for NaN, infinite, zero or negative prices
    pub fn is_valid(&self) -> bool {
        is_valid_price(self.price)
    }
}

/// Chronologically ordered price history for a single asset
///
/// Immutable once built. Consumers borrow it for the duration of one
/// computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    /// Series with no data ("no data" from a feed)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an evenly spaced series starting at `start`
    pub fn from_prices(start: DateTime<Utc>, step: Duration, prices: &[f64]) -> Self {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint::new(start + step * i as i32, price))
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.points.get(index)
    }

    /// Raw prices in order, including malformed ones
    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.price)
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Most recent point with a valid price
    pub fn last_valid(&self) -> Option<&PricePoint> {
        self.points.iter().rev().find(|p| p.is_valid())
    }

    /// Number of points with an invalid price
    pub fn malformed_count(&self) -> usize {
        self.points.iter().filter(|p| !p.is_valid()).count()
    }
}

impl From<Vec<PricePoint>> for PriceSeries {
    fn from(points: Vec<PricePoint>) -> Self {
        Self::new(points)
    }
}

impl<'a> IntoIterator for &'a PriceSeries {
    type Item = &'a PricePoint;
    type IntoIter = std::slice::Iter<'a, PricePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Current spot quote for an asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotPrice {
    pub symbol: String,          // "SOL/USD"
    pub price: Decimal,
    pub source: String,          // "coingecko"
    pub timestamp: DateTime<Utc>,
    pub confidence: Option<f64>, // 0.0 - 1.0 based on source quality
}

/// Token metadata from the market data provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenInfo {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub image: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub reddit: Option<String>,
    pub fdv_usd: Option<f64>,
    pub max_supply: Option<f64>,
    pub market_cap_usd: Option<f64>,
}

/// Data source health/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source: String,
    pub is_healthy: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_rate_24h: f64,
    pub avg_latency_ms: u64,
}

/// Error types for data retrieval
#[derive(Debug, thiserror::Error)]
pub enum DataRetrievalError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded for {source_name}")]
    RateLimit {
        source_name: String,
        retry_after: Option<u64>,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Source unhealthy: {0}")]
    SourceUnhealthy(String),
}

impl DataRetrievalError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataRetrievalError::AssetNotFound(_))
    }
}

/// Result type for data retrieval operations
pub type Result<T> = std::result::Result<T, DataRetrievalError>;

/// Historical price feed
///
/// An empty series means "no data" and is not an error.
#[async_trait::async_trait]
pub trait PriceFeed: Send + Sync {
    /// Daily prices for the last `days` days, oldest first
    async fn fetch_prices(&self, token_id: &str, days: u32) -> Result<PriceSeries>;

    /// Get source health status
    async fn health(&self) -> SourceHealth;

    /// Source name
    fn name(&self) -> &str;
}

/// Next-price prediction service
#[async_trait::async_trait]
pub trait PredictionSource: Send + Sync {
    /// `Ok(None)` when the service has no prediction for the token
    async fn predict_next_price(&self, token_id: &str) -> Result<Option<f64>>;
}
