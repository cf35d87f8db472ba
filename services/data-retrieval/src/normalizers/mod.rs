// Normalization of raw provider payloads into the shared price types
use crate::types::*;
use chrono::DateTime;
use tracing::warn;

/// Convert a market chart `[[timestamp_ms, price], ...]` payload to a series
///
/// Points with an unrepresentable timestamp are dropped. Null prices are kept
/// as NaN so the consumer can decide how to treat them. The result is sorted
/// oldest first.
pub fn normalize_market_chart(asset: &str, raw: Vec<(f64, Option<f64>)>) -> PriceSeries {
    let total = raw.len();
    let mut points: Vec<PricePoint> = raw
        .into_iter()
        .filter_map(|(timestamp_ms, price)| {
            let timestamp = DateTime::from_timestamp_millis(timestamp_ms as i64)?;
            Some(PricePoint::new(timestamp, price.unwrap_or(f64::NAN)))
        })
        .collect();

    if points.len() < total {
        warn!(
            "{}: dropped {} points with invalid timestamps",
            asset,
            total - points.len()
        );
    }

    points.sort_by_key(|p| p.timestamp);

    let series = PriceSeries::new(points);
    let malformed = series.malformed_count();
    if malformed > 0 {
        warn!("{}: {} points have no usable price", asset, malformed);
    }
    series
}

/// Validate that a predicted price is usable
pub fn validate_prediction(price: Option<f64>) -> Option<f64> {
    price.filter(|&p| is_valid_price(p))
}
