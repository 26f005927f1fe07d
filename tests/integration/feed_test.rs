//! Integration tests for the streaming price feed

use futures_util::{SinkExt, StreamExt};
use marketx::feed::{FeedSettings, PriceFeed, PriceFeedCoordinator, UpbitFeed, UpbitRestClient};
use marketx::market::AssetView;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const BTC_TICKER: &str =
    r#"{"type":"ticker","code":"KRW-BTC","trade_price":160000000.0,"acc_trade_price_24h":1000.0}"#;
const ETH_TICKER: &str = r#"{"type":"ticker","code":"KRW-ETH","trade_price":3500000.0}"#;

/// Accept one connection, report its subscription frame, then send the given frames
async fn ticker_server(frames: Vec<Message>) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (sub_tx, sub_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        if let Some(Ok(Message::Text(subscription))) = ws.next().await {
            let _ = sub_tx.send(subscription);
        }
        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        // Hold the connection open until the client goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    (url, sub_rx)
}

#[tokio::test]
async fn test_upbit_feed_subscribes_and_parses_frames() {
    let (url, sub_rx) = ticker_server(vec![
        Message::Text(r#"{"status":"UP"}"#.to_string()),
        Message::Binary(BTC_TICKER.as_bytes().to_vec()),
        Message::Text("not json".to_string()),
        Message::Text(ETH_TICKER.to_string()),
    ])
    .await;

    let feed = UpbitFeed::new(url);
    let cancel = CancellationToken::new();
    let markets = vec!["KRW-BTC".to_string(), "KRW-ETH".to_string()];
    let mut rx = feed.subscribe(&markets, cancel.clone()).await.unwrap();

    let subscription = timeout(Duration::from_secs(10), sub_rx).await.unwrap().unwrap();
    let frame: serde_json::Value = serde_json::from_str(&subscription).unwrap();
    assert_eq!(frame[1]["type"], "ticker");
    assert_eq!(frame[1]["codes"], serde_json::json!(["KRW-BTC", "KRW-ETH"]));
    assert_eq!(frame[2]["format"], "DEFAULT");

    let btc = timeout(Duration::from_secs(10), rx.recv()).await.unwrap().unwrap();
    assert_eq!(btc.asset_id, "BTC");
    assert_eq!(btc.price, dec!(160000000));
    assert_eq!(btc.volume_24h, Some(dec!(1000)));

    // Status and malformed frames are skipped without dropping the connection
    let eth = timeout(Duration::from_secs(10), rx.recv()).await.unwrap().unwrap();
    assert_eq!(eth.asset_id, "ETH");

    cancel.cancel();
}

#[tokio::test]
async fn test_coordinator_streams_into_board() {
    let (url, _sub_rx) = ticker_server(vec![
        Message::Text(BTC_TICKER.to_string()),
        Message::Text(
            r#"{"type":"ticker","code":"KRW-BTC","trade_price":161600000.0}"#.to_string(),
        ),
    ])
    .await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let snapshots = Arc::new(UpbitRestClient::with_client("http://127.0.0.1:1", client));
    let settings = FeedSettings {
        polling_enabled: false,
        ..Default::default()
    };
    let mut coordinator =
        PriceFeedCoordinator::new(settings, Arc::new(UpbitFeed::new(url)), snapshots);

    let (tx, mut rx) = mpsc::unbounded_channel();
    coordinator
        .start(&["BTC".to_string()], move |_: &str, view: &AssetView| {
            let _ = tx.send(view.clone());
        })
        .unwrap();

    let first = timeout(Duration::from_secs(10), rx.recv()).await.unwrap().unwrap();
    let second = timeout(Duration::from_secs(10), rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.price, Some(dec!(160000000)));
    assert_eq!(second.price, Some(dec!(161600000)));
    assert_eq!(second.previous_price, Some(dec!(160000000)));
    assert_eq!(second.change_pct, dec!(1));
    assert!(second.ticked_up());

    coordinator.stop().await;
    assert!(!coordinator.is_running());
}
