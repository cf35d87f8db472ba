//! Z-score computation
//!
//! The default window is the whole series: every price is scored against the
//! mean and population standard deviation of all valid prices in the series.
//! A trailing window is available for callers that want rolling statistics.

use data_retrieval::{is_valid_price, PriceSeries};
use serde::{Deserialize, Serialize};

/// Points required before any statistic is computed
pub const MIN_WINDOW: usize = 20;

/// Relative spread below which the series is treated as constant
const ZERO_VARIANCE_EPSILON: f64 = 1e-12;

/// Which prices a point's statistics are computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "size")]
pub enum ZScoreWindow {
    /// Mean/stddev of the entire series
    #[default]
    WholeSeries,
    /// Mean/stddev of the last `n` prices up to and including the point
    Trailing(usize),
}

/// Whole-series Z-score, one value per price
///
/// Shorter than [`MIN_WINDOW`]: all zeros. Prices that are not finite and
/// positive are left out of the statistics and score NaN at their own index.
pub fn compute_zscore(series: &PriceSeries) -> Vec<f64> {
    compute_zscore_with(series, ZScoreWindow::WholeSeries)
}

pub fn compute_zscore_with(series: &PriceSeries, window: ZScoreWindow) -> Vec<f64> {
    let prices: Vec<f64> = series.prices().collect();
    if prices.len() < MIN_WINDOW {
        return vec![0.0; prices.len()];
    }

    match window {
        ZScoreWindow::WholeSeries => {
            let moments = Moments::of(&prices);
            prices.iter().map(|&p| moments.score(p)).collect()
        }
        ZScoreWindow::Trailing(size) => trailing_zscores(&prices, size.max(2)),
    }
}

fn trailing_zscores(prices: &[f64], size: usize) -> Vec<f64> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| {
            if i + 1 < size {
                return 0.0;
            }
            Moments::of(&prices[i + 1 - size..=i]).score(price)
        })
        .collect()
}

/// Mean and population standard deviation over valid prices
#[derive(Debug, Clone, Copy)]
struct Moments {
    mean: f64,
    std_dev: f64,
}

impl Moments {
    fn of(prices: &[f64]) -> Self {
        let valid = || prices.iter().copied().filter(|&p| is_valid_price(p));

        let count = valid().count();
        if count == 0 {
            return Self {
                mean: f64::NAN,
                std_dev: f64::NAN,
            };
        }

        let mean = valid().sum::<f64>() / count as f64;
        let variance = valid().map(|p| (p - mean).powi(2)).sum::<f64>() / count as f64;

        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }

    fn score(&self, price: f64) -> f64 {
        if !is_valid_price(price) || !self.mean.is_finite() {
            return f64::NAN;
        }
        // Spread negligible relative to the mean: constant input, defined as 0
        if self.std_dev <= self.mean.abs() * ZERO_VARIANCE_EPSILON {
            return 0.0;
        }
        (price - self.mean) / self.std_dev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(prices: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PriceSeries::from_prices(start, Duration::days(1), prices)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_short_series_is_all_zeros() {
        let z = compute_zscore(&series(&[1.0, 5.0, 9.0]));
        assert_eq!(z, vec![0.0, 0.0, 0.0]);
        assert!(compute_zscore(&PriceSeries::empty()).is_empty());
    }

    #[test]
    fn test_constant_series_scores_zero() {
        let z = compute_zscore(&series(&[0.1; 30]));
        assert_eq!(z.len(), 30);
        assert!(z.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_whole_series_population_zscore() {
        let mut prices = vec![100.0; 21];
        prices.extend([90.0, 80.0, 70.0, 60.0]);
        let z = compute_zscore(&series(&prices));

        // mean 96, population variance 104
        let sd = 104f64.sqrt();
        assert!(approx(z[0], 4.0 / sd));
        assert!(approx(z[21], -6.0 / sd));
        assert!(approx(z[22], -16.0 / sd));
        assert!(approx(z[24], -36.0 / sd));
    }

    #[test]
    fn test_nan_prices_are_omitted_and_propagate() {
        let mut prices: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let clean = compute_zscore(&series(&prices));
        prices.insert(5, f64::NAN);
        prices.push(f64::INFINITY);

        let z = compute_zscore(&series(&prices));
        assert_eq!(z.len(), 22);
        assert!(z[5].is_nan());
        assert!(z[21].is_nan());
        // Statistics match the series without the malformed points
        assert!(approx(z[0], clean[0]));
        assert!(approx(z[20], clean[19]));
    }

    #[test]
    fn test_trailing_window() {
        let mut prices = vec![10.0; 20];
        prices.extend([10.0, 10.0, 20.0]);
        let z = compute_zscore_with(&series(&prices), ZScoreWindow::Trailing(3));

        assert_eq!(z[0], 0.0);
        assert_eq!(z[1], 0.0);
        assert_eq!(z[21], 0.0);
        // Window [10, 10, 20]: mean 40/3, population sd = sqrt(200/9)
        let expected = (20.0 - 40.0 / 3.0) / (200.0f64 / 9.0).sqrt();
        assert!(approx(z[22], expected));
    }

    #[test]
    fn test_zero_and_negative_prices_are_malformed() {
        let mut prices: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let clean = compute_zscore(&series(&prices));
        prices.extend([0.0, -3.0]);

        let z = compute_zscore(&series(&prices));
        assert!(z[20].is_nan());
        assert!(z[21].is_nan());
        assert!(approx(z[19], clean[19]));
    }

    #[test]
    fn test_tiny_prices_keep_their_signal() {
        let mut prices = vec![100.0; 21];
        prices.extend([90.0, 80.0, 70.0, 60.0]);
        let scaled: Vec<f64> = prices.iter().map(|p| p * 1e-14).collect();

        let z = compute_zscore(&series(&prices));
        let z_scaled = compute_zscore(&series(&scaled));
        assert!(z_scaled[22] < -1.0);
        for (a, b) in z.iter().zip(&z_scaled) {
            assert!(approx(*a, *b));
        }
        assert!(compute_zscore(&series(&[3e-15; 25])).iter().all(|&v| v == 0.0));
    }
}
