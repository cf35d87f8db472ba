//! Mean reversion strategy engine
//!
//! Z-score signals over a historical price series, a backtest of the
//! resulting entries and exits, a parameter sweep, and the latest-price
//! trading decision with an optional prediction override. Everything here
//! works on an in-memory `PriceSeries`; [`Market`] fetches one from the
//! configured collaborators.

pub mod algorithms;
pub mod backtest;
pub mod config;
pub mod error;
pub mod market;
pub mod predictor;
pub mod report;

pub use algorithms::{
    compute_zscore, compute_zscore_with, signal_from_zscore, Algorithm, Decision, DecisionSource,
    MeanReversionStrategy, Signal, ZScoreWindow, MIN_WINDOW,
};
pub use backtest::{
    grid_search, run, Account, BacktestOutcome, BacktestParams, BacktestSimulator, GridResult,
    ParameterGrid, Position, TradeAction, TradeLogEntry,
};
pub use config::AppConfig;
pub use error::{Result, StrategyError};
pub use market::Market;
pub use predictor::{NoPrediction, PricePredictor};
pub use report::{final_report_line, render};
