//! Client for the next-price prediction service
//!
//! The service exposes `GET /api/ai-predict/{token}` and answers either
//! `{"token": "...", "predicted_price": 123.4}` or `{"error": "..."}`.

use crate::normalizers::validate_prediction;
use crate::types::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub struct PredictionClient {
    client: Client,
    base_url: String,
}

impl PredictionClient {
    const REQUEST_TIMEOUT_SECS: u64 = 15;

    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(Self::REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DataRetrievalError::ApiError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Predicted next price, `None` when the service has none
    pub async fn predict_next_price(&self, token_id: &str) -> Result<Option<f64>> {
        let url = format!("{}/api/ai-predict/{}", self.base_url, token_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataRetrievalError::ApiError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DataRetrievalError::ApiError(format!(
                "Prediction service error ({}): {}",
                status, text
            )));
        }

        let body: PredictionResponse = response
            .json()
            .await
            .map_err(|e| DataRetrievalError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            debug!("No prediction for {}: {}", token_id, error);
            return Ok(None);
        }

        Ok(validate_prediction(body.predicted_price))
    }
}

#[derive(Debug, serde::Deserialize)]
struct PredictionResponse {
    predicted_price: Option<f64>,
    error: Option<String>,
}

#[async_trait::async_trait]
impl PredictionSource for PredictionClient {
    async fn predict_next_price(&self, token_id: &str) -> Result<Option<f64>> {
        PredictionClient::predict_next_price(self, token_id).await
    }
}
