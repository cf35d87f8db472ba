//! Human-readable backtest reports

use crate::backtest::{BacktestOutcome, TradeLogEntry};
use std::fmt;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl fmt::Display for TradeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at ${:.2} on {}",
            self.action.label(),
            self.price,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }
}

pub fn final_report_line(outcome: &BacktestOutcome) -> String {
    format!(
        "Final Balance: ${:.2} | Net Profit: ${:.2}",
        outcome.final_balance,
        outcome.net_profit()
    )
}

/// One line per trade followed by the final report line
pub fn render(outcome: &BacktestOutcome) -> String {
    let mut lines: Vec<String> = outcome.trade_log.iter().map(|t| t.to_string()).collect();
    lines.push(final_report_line(outcome));
    lines.join("\n")
}

/// Trade count, win rate and return, for the sweep table
pub fn summary_line(outcome: &BacktestOutcome) -> String {
    let win_rate = match outcome.win_rate() {
        Some(rate) => format!("{:.0}%", rate * 100.0),
        None => "n/a".to_string(),
    };
    format!(
        "{} round trips, win rate {}, return {:+.2}%",
        outcome.round_trips(),
        win_rate,
        outcome.return_pct()
    )
}
