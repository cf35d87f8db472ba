//! Backtesting - replay of the mean reversion rules over historical prices
//!
//! One account, fully invested or fully in cash. Entries on a low Z-score,
//! exits on stop-loss, take-profit or a high Z-score, in that order.

use crate::algorithms::ZScoreWindow;
use crate::error::{Result, StrategyError};
use chrono::{DateTime, Utc};
use data_retrieval::PriceSeries;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod grid;
pub mod simulator;

pub use grid::{grid_search, GridResult, ParameterGrid};
pub use simulator::BacktestSimulator;

/// Backtest parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestParams {
    /// Starting cash
    pub initial_balance: f64,
    /// Z-score magnitude for entries and mean-reversion exits
    pub z_threshold: f64,
    /// Exit when price falls this fraction below entry (0.05 = 5%)
    pub stop_loss_pct: f64,
    /// Exit when price rises this fraction above entry
    pub take_profit_pct: f64,
    pub window: ZScoreWindow,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            z_threshold: 1.0,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.10,
            window: ZScoreWindow::WholeSeries,
        }
    }
}

impl BacktestParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(StrategyError::invalid(
                "initial_balance",
                format!("must be positive, got {}", self.initial_balance),
            ));
        }
        if !(self.z_threshold.is_finite() && self.z_threshold > 0.0) {
            return Err(StrategyError::invalid(
                "z_threshold",
                format!("must be positive, got {}", self.z_threshold),
            ));
        }
        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0) {
            return Err(StrategyError::invalid(
                "stop_loss_pct",
                format!("must be between 0 and 1, got {}", self.stop_loss_pct),
            ));
        }
        if !(self.take_profit_pct.is_finite() && self.take_profit_pct > 0.0) {
            return Err(StrategyError::invalid(
                "take_profit_pct",
                format!("must be positive, got {}", self.take_profit_pct),
            ));
        }
        if let ZScoreWindow::Trailing(size) = self.window {
            if size < 2 {
                return Err(StrategyError::invalid(
                    "window",
                    format!("trailing window needs at least 2 prices, got {}", size),
                ));
            }
        }
        Ok(())
    }

    /// Price at or below which an open position is stopped out
    pub fn stop_loss_level(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.stop_loss_pct)
    }

    /// Price at or above which an open position takes profit
    pub fn take_profit_level(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.take_profit_pct)
    }
}

/// What happened at a trade log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    SellStopLoss,
    SellTakeProfit,
    SellMeanReversion,
}

impl TradeAction {
    /// Label used in trade reports
    pub fn label(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::SellStopLoss => "STOP-LOSS triggered! SELL",
            TradeAction::SellTakeProfit => "TAKE-PROFIT triggered! SELL",
            TradeAction::SellMeanReversion => "SELL",
        }
    }

    pub fn is_exit(&self) -> bool {
        !matches!(self, TradeAction::Buy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub action: TradeAction,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Position of the step in the price series
    pub index: usize,
}

/// Open long position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

/// Cash plus at most one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub cash_balance: f64,
    pub position: Option<Position>,
}

impl Account {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            cash_balance: initial_balance,
            position: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Put all cash into a position at `price`
    pub fn open(&mut self, price: f64) -> Position {
        let position = Position {
            quantity: self.cash_balance / price,
            entry_price: price,
        };
        debug!(
            "Opened position: {:.6} units at {:.4}, cash {:.2} -> 0",
            position.quantity, price, self.cash_balance
        );
        self.cash_balance = 0.0;
        self.position = Some(position);
        position
    }

    /// Sell the whole position at `price`
    pub fn close(&mut self, price: f64) -> Option<Position> {
        let position = self.position.take()?;
        self.cash_balance = position.market_value(price);
        debug!(
            "Closed position: {:.6} units at {:.4}, cash now {:.2}",
            position.quantity, price, self.cash_balance
        );
        Some(position)
    }

    /// Cash plus position value at `price`, without changing the account
    pub fn mark_to_market(&self, price: f64) -> f64 {
        match &self.position {
            Some(position) => self.cash_balance + position.market_value(price),
            None => self.cash_balance,
        }
    }
}

/// Result of one backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutcome {
    /// Cash at the end, with any open position marked at the last valid price
    pub final_balance: f64,
    pub initial_balance: f64,
    pub trade_log: Vec<TradeLogEntry>,
    /// Position still held after the last step
    pub open_position: Option<Position>,
    pub steps_evaluated: usize,
    /// Steps skipped because the price or its Z-score was not finite
    pub skipped_steps: usize,
}

impl BacktestOutcome {
    /// Outcome of a backtest that never traded
    pub fn untouched(initial_balance: f64) -> Self {
        Self {
            final_balance: initial_balance,
            initial_balance,
            trade_log: Vec::new(),
            open_position: None,
            steps_evaluated: 0,
            skipped_steps: 0,
        }
    }

    pub fn net_profit(&self) -> f64 {
        self.final_balance - self.initial_balance
    }

    /// Net profit as a percentage of the initial balance
    pub fn return_pct(&self) -> f64 {
        self.net_profit() / self.initial_balance * 100.0
    }

    /// Number of closed trades
    pub fn round_trips(&self) -> usize {
        self.trade_log.iter().filter(|e| e.action.is_exit()).count()
    }

    /// Share of closed trades that exited above their entry, None with no closed trades
    pub fn win_rate(&self) -> Option<f64> {
        let mut entry = None;
        let mut closed = 0usize;
        let mut wins = 0usize;

        for trade in &self.trade_log {
            if trade.action.is_exit() {
                if let Some(entry_price) = entry.take() {
                    closed += 1;
                    if trade.price > entry_price {
                        wins += 1;
                    }
                }
            } else {
                entry = Some(trade.price);
            }
        }

        if closed == 0 {
            None
        } else {
            Some(wins as f64 / closed as f64)
        }
    }
}

/// Backtest with the whole-series Z-score
///
/// Returns the final balance and the trade log.
pub fn run(
    series: &PriceSeries,
    initial_balance: f64,
    z_threshold: f64,
    stop_loss_pct: f64,
    take_profit_pct: f64,
) -> Result<(f64, Vec<TradeLogEntry>)> {
    let simulator = BacktestSimulator::new(BacktestParams {
        initial_balance,
        z_threshold,
        stop_loss_pct,
        take_profit_pct,
        window: ZScoreWindow::WholeSeries,
    })?;
    let outcome = simulator.run(series);
    Ok((outcome.final_balance, outcome.trade_log))
}
