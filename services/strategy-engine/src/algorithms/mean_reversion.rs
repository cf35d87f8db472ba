//! Mean Reversion decision
//!
//! Scores the latest price against the series mean:
//! - Buy when the Z-score is below -threshold (price unusually low)
//! - Sell when it is above +threshold (price unusually high)
//! - An optional next-price prediction overrides the Z-score when it moves
//!   further than `ai_override_pct` from the last price

use super::signal::{signal_from_zscore, Decision, DecisionSource, Signal};
use super::zscore::{compute_zscore, MIN_WINDOW};
use super::Algorithm;
use crate::error::{Result, StrategyError};
use crate::predictor::PricePredictor;
use data_retrieval::{is_valid_price, PriceSeries};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_DECISION_THRESHOLD: f64 = 1.5;
pub const DEFAULT_AI_OVERRIDE_PCT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionStrategy {
    /// Z-score magnitude needed for Buy/Sell
    pub threshold: f64,
    /// Relative prediction move needed to override the Z-score (0.05 = 5%)
    pub ai_override_pct: f64,
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DECISION_THRESHOLD,
            ai_override_pct: DEFAULT_AI_OVERRIDE_PCT,
        }
    }
}

impl MeanReversionStrategy {
    pub fn new(threshold: f64, ai_override_pct: f64) -> Result<Self> {
        let strategy = Self {
            threshold,
            ai_override_pct,
        };
        strategy.validate()?;
        Ok(strategy)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(StrategyError::invalid(
                "threshold",
                format!("must be a positive number, got {}", self.threshold),
            ));
        }
        if !(self.ai_override_pct.is_finite() && self.ai_override_pct >= 0.0) {
            return Err(StrategyError::invalid(
                "ai_override_pct",
                format!("must be non-negative, got {}", self.ai_override_pct),
            ));
        }
        Ok(())
    }

    /// Decision for the most recent price in `series`
    pub fn decide(
        &self,
        token_id: &str,
        series: &PriceSeries,
        use_ai_override: bool,
        predictor: &dyn PricePredictor,
    ) -> Signal {
        self.evaluate(token_id, series, use_ai_override, predictor)
            .signal
    }

    /// Prediction-based signal, or None to fall through to the Z-score
    fn ai_override(&self, last_price: f64, predicted: f64) -> Option<Signal> {
        if !is_valid_price(last_price) {
            return None;
        }
        let change = (predicted - last_price) / last_price;
        if change > self.ai_override_pct {
            Some(Signal::Buy)
        } else if change < -self.ai_override_pct {
            Some(Signal::Sell)
        } else {
            None
        }
    }
}

impl Algorithm for MeanReversionStrategy {
    fn name(&self) -> &str {
        "MeanReversion"
    }

    fn evaluate(
        &self,
        token_id: &str,
        series: &PriceSeries,
        use_ai_override: bool,
        predictor: &dyn PricePredictor,
    ) -> Decision {
        if series.len() < MIN_WINDOW {
            return Decision::hold(
                DecisionSource::InsufficientData,
                format!(
                    "{} price points for {}, need at least {}",
                    series.len(),
                    token_id,
                    MIN_WINDOW
                ),
            );
        }

        let last_price = series.last().map(|p| p.price).unwrap_or(f64::NAN);

        let mut predicted_price = None;
        if use_ai_override {
            predicted_price = predictor.predict_next_price(token_id);
            match predicted_price {
                Some(predicted) => {
                    if let Some(signal) = self.ai_override(last_price, predicted) {
                        debug!(
                            "{}: prediction {:.4} vs last {:.4} overrides Z-score",
                            token_id, predicted, last_price
                        );
                        return Decision::new(
                            signal,
                            DecisionSource::AiOverride,
                            format!(
                                "Predicted {:.4} is {:+.2}% from last price {:.4}",
                                predicted,
                                (predicted - last_price) / last_price * 100.0,
                                last_price
                            ),
                        )
                        .with_last_price(last_price)
                        .with_prediction(predicted_price);
                    }
                }
                None => debug!("{}: no prediction available", token_id),
            }
        }

        let z = compute_zscore(series).last().copied().unwrap_or(f64::NAN);

        if !is_valid_price(last_price) || z.is_nan() {
            warn!(
                "{}: latest price {} is malformed, holding",
                token_id, last_price
            );
            return Decision::hold(
                DecisionSource::MalformedPrice,
                format!("Latest price {} is not a positive number", last_price),
            )
            .with_prediction(predicted_price);
        }

        let signal = signal_from_zscore(z, self.threshold);
        Decision::new(
            signal,
            DecisionSource::ZScore,
            format!("Z-score {:.3} against threshold ±{}", z, self.threshold),
        )
        .with_z_score(z)
        .with_last_price(last_price)
        .with_prediction(predicted_price)
    }
}
