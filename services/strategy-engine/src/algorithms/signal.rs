//! Trading signals - output from algorithms

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading signal type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Enter a long position
    Buy,
    /// Exit a long position
    Sell,
    /// No action
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "Buy",
            Signal::Sell => "Sell",
            Signal::Hold => "Hold",
        }
    }

    pub fn is_actionable(&self) -> bool {
        *self != Signal::Hold
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a Z-score to a signal
///
/// Strictly above `threshold` sells, strictly below `-threshold` buys. Equality
/// and NaN hold.
pub fn signal_from_zscore(z: f64, threshold: f64) -> Signal {
    if z > threshold {
        Signal::Sell
    } else if z < -threshold {
        Signal::Buy
    } else {
        Signal::Hold
    }
}

/// Which rule produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Fewer prices than the Z-score window needs
    InsufficientData,
    /// Prediction moved far enough from the last price
    AiOverride,
    /// Z-score of the most recent price
    ZScore,
    /// Most recent price or its Z-score is not a finite number
    MalformedPrice,
}

/// Decision with the inputs that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub signal: Signal,
    pub source: DecisionSource,
    /// Z-score of the last price, when one was computed
    pub z_score: Option<f64>,
    pub last_price: Option<f64>,
    pub predicted_price: Option<f64>,
    pub reason: String,
}

impl Decision {
    pub fn hold(source: DecisionSource, reason: impl Into<String>) -> Self {
        Self {
            signal: Signal::Hold,
            source,
            z_score: None,
            last_price: None,
            predicted_price: None,
            reason: reason.into(),
        }
    }

    pub fn new(signal: Signal, source: DecisionSource, reason: impl Into<String>) -> Self {
        Self {
            signal,
            source,
            z_score: None,
            last_price: None,
            predicted_price: None,
            reason: reason.into(),
        }
    }

    pub fn with_z_score(mut self, z: f64) -> Self {
        self.z_score = Some(z);
        self
    }

    pub fn with_last_price(mut self, price: f64) -> Self {
        self.last_price = Some(price);
        self
    }

    pub fn with_prediction(mut self, predicted: Option<f64>) -> Self {
        self.predicted_price = predicted;
        self
    }
}
