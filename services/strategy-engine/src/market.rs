//! Market data access for the strategy commands
//!
//! Wraps the CoinGecko client, history cache, fallback policy and optional
//! prediction service built from [`AppConfig`]. Collaborator failures never
//! surface as errors here: a failed history fetch is an empty series and a
//! failed prediction is no prediction.

use crate::config::AppConfig;
use crate::error::Result;
use data_retrieval::{CoinGeckoClient, PredictionClient, PriceSeries, TokenFallback, TtlCache};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Market {
    client: CoinGeckoClient,
    fallback: TokenFallback,
    predictor: Option<PredictionClient>,
}

impl Market {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let cache = Arc::new(TtlCache::from_secs(config.market.history_cache_secs));
        let mut client =
            CoinGeckoClient::new(config.coingecko.api_key.clone())?.with_history_cache(cache);
        if let Some(url) = &config.coingecko.base_url {
            client = client.with_base_url(url.clone());
        }

        let predictor = match &config.predictor.url {
            Some(url) => Some(PredictionClient::new(url.clone())?),
            None => None,
        };

        Ok(Self {
            client,
            fallback: TokenFallback::new(config.market.fallback_token.clone()),
            predictor,
        })
    }

    pub fn client(&self) -> &CoinGeckoClient {
        &self.client
    }

    pub fn fallback(&self) -> &TokenFallback {
        &self.fallback
    }

    /// Daily history for `token` as `(resolved token id, series)`
    ///
    /// Feed failures come back as an empty series under the requested id.
    pub async fn history(&self, token: &str, days: u32) -> (String, PriceSeries) {
        let client = &self.client;
        let resolved = self
            .fallback
            .resolve(token, |t| async move { client.fetch_prices(&t, days).await })
            .await;

        match resolved {
            Ok(resolved) => {
                info!(
                    "Fetched {} daily prices for {}",
                    resolved.value.len(),
                    resolved.token_id
                );
                let malformed = resolved.value.malformed_count();
                if malformed > 0 {
                    warn!("{} malformed prices in {} history", malformed, resolved.token_id);
                }
                (resolved.token_id, resolved.value)
            }
            Err(e) => {
                warn!("Failed to fetch prices for {}: {}", token, e);
                (token.to_string(), PriceSeries::empty())
            }
        }
    }

    /// Next-price prediction; None when unconfigured or unavailable
    pub async fn prediction(&self, token: &str) -> Option<f64> {
        let Some(predictor) = &self.predictor else {
            warn!("Prediction override requested but no predictor URL is configured");
            return None;
        };

        match predictor.predict_next_price(token).await {
            Ok(prediction) => {
                debug!("Prediction for {}: {:?}", token, prediction);
                prediction
            }
            Err(e) => {
                warn!("Prediction for {} unavailable: {}", token, e);
                None
            }
        }
    }
}
