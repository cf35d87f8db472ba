//! Trading decisions over data fetched from mocked collaborators
//!
//! fetch (CoinGecko) → optional prediction → decision


use data_retrieval::{CoinGeckoClient, PredictionClient, PriceSeries, TokenFallback};
use mock_market::{flat_then, mount_market_chart, mount_prediction, mount_unknown_coin};
use strategy_engine::{
    Algorithm, DecisionSource, MeanReversionStrategy, NoPrediction, PricePredictor, Signal,
};
use wiremock::MockServer;

async fn fetch(server: &MockServer, token: &str) -> PriceSeries {
    CoinGeckoClient::new(None)
        .unwrap()
        .with_base_url(server.uri())
        .fetch_prices(token, 90)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_spike_sells_without_override() {
    let server = MockServer::start().await;
    mount_market_chart(&server, "solana", &flat_then(29, 130.0)).await;

    let series = fetch(&server, "solana").await;
    let decision = MeanReversionStrategy::default().evaluate("solana", &series, false, &NoPrediction);

    assert_eq!(series.len(), 30);
    assert_eq!(decision.signal, Signal::Sell);
    assert_eq!(decision.source, DecisionSource::ZScore);
    assert_eq!(decision.last_price, Some(130.0));
}

#[tokio::test]
async fn test_prediction_six_percent_up_buys() {
    let server = MockServer::start().await;
    mount_market_chart(&server, "solana", &flat_then(29, 130.0)).await;
    mount_prediction(&server, "solana", Some(130.0 * 1.06)).await;

    let series = fetch(&server, "solana").await;
    let prediction = PredictionClient::new(server.uri())
        .unwrap()
        .predict_next_price("solana")
        .await
        .unwrap();

    let strategy = MeanReversionStrategy::default();
    let decision = strategy.evaluate("solana", &series, true, &prediction);

    assert_eq!(decision.signal, Signal::Buy);
    assert_eq!(decision.source, DecisionSource::AiOverride);
    assert_eq!(decision.predicted_price, prediction);
}

#[tokio::test]
async fn test_failed_prediction_falls_back_to_zscore() {
    let server = MockServer::start().await;
    mount_market_chart(&server, "bitcoin", &flat_then(29, 70.0)).await;
    mount_prediction(&server, "bitcoin", None).await;

    let series = fetch(&server, "bitcoin").await;
    let prediction = PredictionClient::new(server.uri())
        .unwrap()
        .predict_next_price("bitcoin")
        .await
        .unwrap();
    assert!(prediction.is_none());

    let signal = MeanReversionStrategy::default().decide("bitcoin", &series, true, &prediction);
    assert_eq!(signal, Signal::Buy);
}

#[tokio::test]
async fn test_unknown_token_with_fallback() {
    let server = MockServer::start().await;
    mount_unknown_coin(&server, "not-a-coin").await;
    mount_market_chart(&server, "avalanche-2", &[100.0; 25]).await;

    let client = CoinGeckoClient::new(None).unwrap().with_base_url(server.uri());
    let client = &client;
    let resolved = TokenFallback::new(Some("avalanche-2".to_string()))
        .resolve("not-a-coin", |t| async move { client.fetch_prices(&t, 90).await })
        .await
        .unwrap();

    assert!(resolved.substituted);
    assert_eq!(resolved.token_id, "avalanche-2");

    let decision =
        MeanReversionStrategy::default().evaluate(&resolved.token_id, &resolved.value, false, &NoPrediction);
    assert_eq!(decision.signal, Signal::Hold);
}

#[tokio::test]
async fn test_short_history_is_insufficient() {
    let server = MockServer::start().await;
    mount_market_chart(&server, "newcoin", &[1.0, 1.1, 1.2]).await;

    let series = fetch(&server, "newcoin").await;
    let decision = MeanReversionStrategy::default().evaluate("newcoin", &series, true, &Some(5.0_f64));

    assert_eq!(decision.signal, Signal::Hold);
    assert_eq!(decision.source, DecisionSource::InsufficientData);
}

#[test]
fn test_prediction_table_predictor() {
    let mut predictions: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    predictions.insert("solana".to_string(), 150.0);
    assert_eq!(predictions.predict_next_price("SOLANA"), Some(150.0));

    let series = tokio_test::block_on(async {
        let server = MockServer::start().await;
        mount_market_chart(&server, "solana", &flat_then(24, 100.0)).await;
        fetch(&server, "solana").await
    });

    // Constant history: Z-score alone holds, the table's prediction buys
    let strategy = MeanReversionStrategy::default();
    assert_eq!(strategy.decide("solana", &series, false, &predictions), Signal::Hold);
    assert_eq!(strategy.decide("solana", &series, true, &predictions), Signal::Buy);
}
