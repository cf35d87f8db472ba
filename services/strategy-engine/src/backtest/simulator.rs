//! Backtest state machine

use super::{Account, BacktestOutcome, BacktestParams, Position, TradeAction, TradeLogEntry};
use crate::algorithms::{compute_zscore_with, MIN_WINDOW};
use crate::error::{Result, StrategyError};
use data_retrieval::{is_valid_price, PriceSeries};
use tracing::{debug, info, warn};

/// Replays a price series against validated parameters
#[derive(Debug, Clone)]
pub struct BacktestSimulator {
    params: BacktestParams,
}

impl BacktestSimulator {
    pub fn new(params: BacktestParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &BacktestParams {
        &self.params
    }

    /// Compute the Z-score series for the configured window and replay it
    pub fn run(&self, series: &PriceSeries) -> BacktestOutcome {
        if series.len() < MIN_WINDOW {
            debug!(
                "Series has {} points, need {}; nothing to backtest",
                series.len(),
                MIN_WINDOW
            );
            return BacktestOutcome::untouched(self.params.initial_balance);
        }

        let zscores = compute_zscore_with(series, self.params.window);
        self.simulate(series, &zscores)
    }

    /// Replay against a caller-supplied Z-score series
    pub fn replay(&self, series: &PriceSeries, zscores: &[f64]) -> Result<BacktestOutcome> {
        if zscores.len() != series.len() {
            return Err(StrategyError::LengthMismatch {
                expected: series.len(),
                actual: zscores.len(),
            });
        }
        Ok(self.simulate(series, zscores))
    }

    pub(crate) fn simulate(&self, series: &PriceSeries, zscores: &[f64]) -> BacktestOutcome {
        let threshold = self.params.z_threshold;
        let mut account = Account::new(self.params.initial_balance);
        let mut trade_log = Vec::new();
        let mut steps_evaluated = 0;
        let mut skipped_steps = 0;

        for (index, point) in series.points().iter().enumerate().skip(MIN_WINDOW) {
            let price = point.price;
            let z = zscores[index];

            if !is_valid_price(price) || z.is_nan() {
                warn!(
                    "Skipping step {} at {}: price {} / z-score {} not usable, holding",
                    index, point.timestamp, price, z
                );
                skipped_steps += 1;
                continue;
            }
            steps_evaluated += 1;

            let action = match account.position {
                None if z < -threshold => {
                    account.open(price);
                    Some(TradeAction::Buy)
                }
                None => None,
                Some(position) => {
                    let exit = self.exit_for(&position, price, z);
                    if exit.is_some() {
                        account.close(price);
                    }
                    exit
                }
            };

            if let Some(action) = action {
                info!(
                    "{} at ${:.2} (step {}, z={:.3}, cash {:.2})",
                    action.label(),
                    price,
                    index,
                    z,
                    account.cash_balance
                );
                trade_log.push(TradeLogEntry {
                    action,
                    price,
                    timestamp: point.timestamp,
                    index,
                });
            }
        }

        let open_position = account.position;
        let final_balance = match (open_position, series.last_valid()) {
            (Some(_), Some(last)) => account.mark_to_market(last.price),
            (Some(position), None) => account.mark_to_market(position.entry_price),
            (None, _) => account.cash_balance,
        };

        if let Some(position) = open_position {
            debug!(
                "Position of {:.6} units still open, marked at final balance {:.2}",
                position.quantity, final_balance
            );
        }

        BacktestOutcome {
            final_balance,
            initial_balance: self.params.initial_balance,
            trade_log,
            open_position,
            steps_evaluated,
            skipped_steps,
        }
    }

    /// First matching exit: stop-loss, take-profit, then mean reversion
    fn exit_for(&self, position: &Position, price: f64, z: f64) -> Option<TradeAction> {
        if price <= self.params.stop_loss_level(position.entry_price) {
            Some(TradeAction::SellStopLoss)
        } else if price >= self.params.take_profit_level(position.entry_price) {
            Some(TradeAction::SellTakeProfit)
        } else if z > self.params.z_threshold {
            Some(TradeAction::SellMeanReversion)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::ZScoreWindow;
    use chrono::{Duration, TimeZone, Utc};

    fn series(prices: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PriceSeries::from_prices(start, Duration::days(1), prices)
    }

    fn simulator(z_threshold: f64) -> BacktestSimulator {
        BacktestSimulator::new(BacktestParams {
            z_threshold,
            ..BacktestParams::default()
        })
        .unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_short_series_is_noop() {
        let outcome = simulator(1.0).run(&series(&[100.0, 50.0, 10.0]));
        assert_eq!(outcome.final_balance, 10_000.0);
        assert!(outcome.trade_log.is_empty());
        assert_eq!(outcome.steps_evaluated, 0);
    }

    #[test]
    fn test_entry_invests_all_cash() {
        let mut prices = vec![100.0; 21];
        prices.extend([80.0, 81.0]);
        let outcome = simulator(1.0).run(&series(&prices));

        let position = outcome.open_position.unwrap();
        assert_eq!(outcome.trade_log.len(), 1);
        assert_eq!(outcome.trade_log[0].action, TradeAction::Buy);
        assert_eq!(outcome.trade_log[0].price, 80.0);
        assert_eq!(outcome.trade_log[0].index, 21);
        assert!(approx(position.quantity, 10_000.0 / 80.0));
        assert_eq!(position.entry_price, 80.0);
        // 81 is inside the 76..88 band; marked at the last price
        assert!(approx(outcome.final_balance, 125.0 * 81.0));
    }

    #[test]
    fn test_stop_loss_precedes_mean_reversion() {
        let mut prices = vec![100.0; 20];
        prices.extend([100.0, 90.0]);
        let mut zscores = vec![0.0; 20];
        zscores.extend([-2.0, 3.0]);

        let outcome = simulator(1.0).replay(&series(&prices), &zscores).unwrap();
        let actions: Vec<_> = outcome.trade_log.iter().map(|t| t.action).collect();
        assert_eq!(actions, vec![TradeAction::Buy, TradeAction::SellStopLoss]);
        assert!(approx(outcome.final_balance, 9_000.0));
    }

    #[test]
    fn test_take_profit_precedes_mean_reversion() {
        let mut prices = vec![100.0; 20];
        prices.extend([100.0, 120.0]);
        let mut zscores = vec![0.0; 20];
        zscores.extend([-2.0, 3.0]);

        let outcome = simulator(1.0).replay(&series(&prices), &zscores).unwrap();
        assert_eq!(outcome.trade_log[1].action, TradeAction::SellTakeProfit);
        assert!(approx(outcome.final_balance, 12_000.0));
    }

    #[test]
    fn test_mean_reversion_exit() {
        let mut prices = vec![100.0; 20];
        prices.extend([100.0, 103.0, 104.0]);
        let mut zscores = vec![0.0; 20];
        zscores.extend([-2.0, 0.5, 1.5]);

        let outcome = simulator(1.0).replay(&series(&prices), &zscores).unwrap();
        let last = outcome.trade_log.last().unwrap();
        assert_eq!(last.action, TradeAction::SellMeanReversion);
        assert_eq!(last.index, 22);
        assert!(approx(outcome.final_balance, 10_400.0));
        assert_eq!(outcome.round_trips(), 1);
        assert_eq!(outcome.win_rate(), Some(1.0));
    }

    #[test]
    fn test_replay_rejects_length_mismatch() {
        let err = simulator(1.0)
            .replay(&series(&[100.0; 25]), &[0.0; 24])
            .unwrap_err();
        assert!(matches!(
            err,
            StrategyError::LengthMismatch { expected: 25, actual: 24 }
        ));
    }

    #[test]
    fn test_malformed_step_is_skipped() {
        let mut prices = vec![100.0; 20];
        prices.extend([100.0, f64::NAN, 104.0]);
        let mut zscores = vec![0.0; 20];
        zscores.extend([-2.0, 5.0, f64::NAN]);

        let outcome = simulator(1.0).replay(&series(&prices), &zscores).unwrap();
        assert_eq!(outcome.trade_log.len(), 1);
        assert_eq!(outcome.skipped_steps, 2);
        assert_eq!(outcome.steps_evaluated, 1);
        // Still holding; marked at the last valid price
        assert!(approx(outcome.final_balance, 10_400.0));
    }

    #[test]
    fn test_terminal_mark_adds_no_log_entry() {
        let mut prices = vec![100.0; 21];
        prices.extend([70.0, 72.0]);
        let outcome = simulator(1.0).run(&series(&prices));

        assert_eq!(outcome.trade_log.len(), 1);
        assert!(outcome.open_position.is_some());
        assert!(approx(outcome.final_balance, 10_000.0 / 70.0 * 72.0));
    }

    #[test]
    fn test_trailing_window_backtest() {
        let mut prices = vec![100.0; 25];
        prices.extend([100.0, 100.0, 100.0, 100.0, 85.0, 100.0, 100.0, 100.0, 100.0]);
        let sim = BacktestSimulator::new(BacktestParams {
            window: ZScoreWindow::Trailing(5),
            ..BacktestParams::default()
        })
        .unwrap();

        let outcome = sim.run(&series(&prices));
        assert_eq!(outcome.trade_log[0].action, TradeAction::Buy);
        assert_eq!(outcome.trade_log[0].index, 29);
        // Back to 100 is above the 10% take-profit level from 85
        assert_eq!(outcome.trade_log[1].action, TradeAction::SellTakeProfit);
        assert_eq!(outcome.trade_log[1].index, 30);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let err = BacktestSimulator::new(BacktestParams {
            initial_balance: -5.0,
            ..BacktestParams::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            StrategyError::InvalidParameter { name: "initial_balance", .. }
        ));
    }

    #[test]
    fn test_zero_price_is_never_traded() {
        let mut prices = vec![100.0; 21];
        prices.extend([0.0, 50.0]);
        let outcome = simulator(1.0).run(&series(&prices));

        // 0 is skipped; 50 is then the first entry
        assert_eq!(outcome.skipped_steps, 1);
        assert_eq!(outcome.trade_log.len(), 1);
        assert_eq!(outcome.trade_log[0].price, 50.0);
        assert!(outcome.final_balance.is_finite());
        assert!(approx(outcome.final_balance, 10_000.0));
    }

    #[test]
    fn test_replay_skips_non_positive_prices() {
        let mut prices = vec![100.0; 20];
        prices.extend([100.0, -4.0, 0.0]);
        let mut zscores = vec![0.0; 20];
        zscores.extend([-2.0, 3.0, 3.0]);

        let outcome = simulator(1.0).replay(&series(&prices), &zscores).unwrap();
        assert_eq!(outcome.trade_log.len(), 1);
        assert_eq!(outcome.skipped_steps, 2);
        assert!(approx(outcome.final_balance, 10_000.0));
    }
}
