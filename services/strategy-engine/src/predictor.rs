//! Next-price prediction seam
//!
//! The decision path is synchronous. Network-backed predictions are fetched
//! ahead of time (see `data_retrieval::PredictionClient`) and handed in as a
//! plain value.

use std::collections::HashMap;

/// Supplies an optional next-period price for a token
pub trait PricePredictor {
    fn predict_next_price(&self, token: &str) -> Option<f64>;
}

/// Predictor that never has an opinion
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrediction;

impl PricePredictor for NoPrediction {
    fn predict_next_price(&self, _token: &str) -> Option<f64> {
        None
    }
}

/// A prediction fetched for the token being decided on
impl PricePredictor for Option<f64> {
    fn predict_next_price(&self, _token: &str) -> Option<f64> {
        *self
    }
}

/// Predictions keyed by lowercase token id
impl PricePredictor for HashMap<String, f64> {
    fn predict_next_price(&self, token: &str) -> Option<f64> {
        self.get(&token.to_lowercase()).copied()
    }
}

impl<P: PricePredictor + ?Sized> PricePredictor for &P {
    fn predict_next_price(&self, token: &str) -> Option<f64> {
        (**self).predict_next_price(token)
    }
}
