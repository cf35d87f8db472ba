//! Parameter sweep over independent backtests

use super::{BacktestOutcome, BacktestParams, BacktestSimulator};
use crate::algorithms::{compute_zscore_with, ZScoreWindow};
use data_retrieval::PriceSeries;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Values to combine; every threshold is tried with every stop-loss and take-profit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    pub z_thresholds: Vec<f64>,
    pub stop_loss_pcts: Vec<f64>,
    pub take_profit_pcts: Vec<f64>,
    pub initial_balance: f64,
    pub window: ZScoreWindow,
}

impl Default for ParameterGrid {
    /// Conservative, moderate and aggressive stop/target pairs
    fn default() -> Self {
        Self {
            z_thresholds: vec![0.5, 1.0, 1.5, 2.0],
            stop_loss_pcts: vec![0.03, 0.05, 0.08],
            take_profit_pcts: vec![0.06, 0.10, 0.15],
            initial_balance: 10_000.0,
            window: ZScoreWindow::WholeSeries,
        }
    }
}

impl ParameterGrid {
    pub fn combinations(&self) -> Vec<BacktestParams> {
        let mut combos = Vec::with_capacity(
            self.z_thresholds.len() * self.stop_loss_pcts.len() * self.take_profit_pcts.len(),
        );
        for &z_threshold in &self.z_thresholds {
            for &stop_loss_pct in &self.stop_loss_pcts {
                for &take_profit_pct in &self.take_profit_pcts {
                    combos.push(BacktestParams {
                        initial_balance: self.initial_balance,
                        z_threshold,
                        stop_loss_pct,
                        take_profit_pct,
                        window: self.window,
                    });
                }
            }
        }
        combos
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridResult {
    pub params: BacktestParams,
    pub outcome: BacktestOutcome,
}

/// Run every valid combination in parallel, best final balance first
pub fn grid_search(series: &PriceSeries, grid: &ParameterGrid) -> Vec<GridResult> {
    let combos = grid.combinations();
    // Every combination shares the window, so the scores are computed once
    let zscores = compute_zscore_with(series, grid.window);

    let mut results: Vec<GridResult> = combos
        .into_par_iter()
        .filter_map(|params| match BacktestSimulator::new(params) {
            Ok(simulator) => {
                let outcome = if series.len() < crate::algorithms::MIN_WINDOW {
                    BacktestOutcome::untouched(params.initial_balance)
                } else {
                    simulator.simulate(series, &zscores)
                };
                Some(GridResult { params, outcome })
            }
            Err(e) => {
                warn!("Skipping grid combination {:?}: {}", params, e);
                None
            }
        })
        .collect();

    results.sort_by(|a, b| b.outcome.final_balance.total_cmp(&a.outcome.final_balance));

    info!(
        "Grid search evaluated {} combinations over {} prices",
        results.len(),
        series.len()
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn oscillating_series() -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prices: Vec<f64> = (0..120)
            .map(|i| 100.0 + (i as f64 * 0.35).sin() * 12.0)
            .collect();
        PriceSeries::from_prices(start, Duration::days(1), &prices)
    }

    #[test]
    fn test_default_grid_size() {
        assert_eq!(ParameterGrid::default().combinations().len(), 36);
    }

    #[test]
    fn test_results_sorted_by_final_balance() {
        let results = grid_search(&oscillating_series(), &ParameterGrid::default());

        assert_eq!(results.len(), 36);
        for pair in results.windows(2) {
            assert!(pair[0].outcome.final_balance >= pair[1].outcome.final_balance);
        }
    }

    #[test]
    fn test_matches_single_backtest() {
        let series = oscillating_series();
        let results = grid_search(&series, &ParameterGrid::default());

        for result in &results {
            let single = BacktestSimulator::new(result.params).unwrap().run(&series);
            assert_eq!(single, result.outcome);
        }
    }

    #[test]
    fn test_invalid_combinations_skipped() {
        let grid = ParameterGrid {
            z_thresholds: vec![1.0, -1.0],
            stop_loss_pcts: vec![0.05, 1.5],
            take_profit_pcts: vec![0.10],
            ..ParameterGrid::default()
        };
        let results = grid_search(&oscillating_series(), &grid);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].params.z_threshold, 1.0);
        assert_eq!(results[0].params.stop_loss_pct, 0.05);
    }

    #[test]
    fn test_short_series_leaves_balance_untouched() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = PriceSeries::from_prices(start, Duration::days(1), &[1.0, 2.0, 3.0]);
        let results = grid_search(&series, &ParameterGrid::default());

        assert!(results.iter().all(|r| r.outcome.final_balance == 10_000.0));
    }
}
