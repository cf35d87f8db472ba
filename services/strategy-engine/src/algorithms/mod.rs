//! Signal generation
//!
//! Z-score statistics over a price series, the threshold rule that turns a
//! score into a signal, and the mean reversion decision built on both.

use crate::predictor::PricePredictor;
use data_retrieval::PriceSeries;

pub mod mean_reversion;
pub mod signal;
pub mod zscore;

pub use mean_reversion::{MeanReversionStrategy, DEFAULT_AI_OVERRIDE_PCT, DEFAULT_DECISION_THRESHOLD};
pub use signal::{signal_from_zscore, Decision, DecisionSource, Signal};
pub use zscore::{compute_zscore, compute_zscore_with, ZScoreWindow, MIN_WINDOW};

/// Decision algorithm over a materialized price series
pub trait Algorithm: Send + Sync {
    /// Algorithm name
    fn name(&self) -> &str;

    /// Decide on the most recent price in `series`
    fn evaluate(
        &self,
        token_id: &str,
        series: &PriceSeries,
        use_ai_override: bool,
        predictor: &dyn PricePredictor,
    ) -> Decision;
}
