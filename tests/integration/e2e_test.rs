//! End-to-end integration tests

use marketx::config::Config;
use marketx::feed::{FeedSettings, PriceFeedCoordinator, UpbitFeed, UpbitRestClient};
use marketx::market::AssetView;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const SNAPSHOT: &str = r#"[
    {"market": "KRW-BTC", "trade_price": 100.0},
    {"market": "KRW-ETH", "trade_price": 200.0}
]"#;

/// Answer every request with the same ticker snapshot
async fn snapshot_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    SNAPSHOT.len(),
                    SNAPSHOT
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    base
}

#[tokio::test]
async fn test_polling_only_feed_fills_board() {
    let base = snapshot_server().await;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let snapshots = Arc::new(UpbitRestClient::with_client(&base, client));
    let stream = Arc::new(UpbitFeed::new("ws://127.0.0.1:1"));

    let settings = FeedSettings {
        streaming_enabled: false,
        poll_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let mut coordinator = PriceFeedCoordinator::new(settings, stream, snapshots);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let ids = vec!["BTC".to_string(), "ETH".to_string()];
    coordinator
        .start(&ids, move |id: &str, view: &AssetView| {
            let _ = tx.send((id.to_string(), view.clone()));
        })
        .unwrap();

    let mut first = Vec::new();
    for _ in 0..2 {
        let update = timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no update within timeout")
            .expect("handler dropped");
        first.push(update);
    }
    coordinator.stop().await;

    assert_eq!(first[0].0, "BTC");
    assert_eq!(first[1].0, "ETH");
    for (expected, (_, view)) in [dec!(100), dec!(200)].into_iter().zip(&first) {
        assert_eq!(view.price, Some(expected));
        assert_eq!(view.samples.len(), 1);
        assert_eq!(view.change_pct, Decimal::ZERO);
    }

    // Nothing arrives after stop returns
    assert!(rx.recv().await.is_none());
}

#[test]
fn test_config_example_parses() {
    let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example")).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.feed.quote_currency, "KRW");
    assert_eq!(config.catalog.len(), 6);
}
