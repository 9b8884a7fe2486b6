//! Feed Pipeline Integration Tests
//!
//! Drives raw feed payloads through the codec, cache, and fan-out hub the
//! way the live connection loop does, and checks what consumers observe.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use ticker_engine::{
    FeedEvent, FeedStatus, HeldPosition, MarketKey, TickerCache, TickerCodec, TickerHub,
    TickerService, Valuation, run_feed_pipeline,
};

struct Pipeline {
    event_tx: mpsc::Sender<FeedEvent>,
    cache: Arc<TickerCache>,
    hub: Arc<TickerHub>,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

fn spawn_pipeline() -> Pipeline {
    let cache = Arc::new(TickerCache::new());
    let hub = Arc::new(TickerHub::with_defaults());
    let status = Arc::new(FeedStatus::new());
    let cancel = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel(64);

    let handle = tokio::spawn(run_feed_pipeline(
        event_rx,
        Arc::clone(&cache),
        Arc::clone(&hub),
        Arc::clone(&status),
        cancel.clone(),
    ));

    Pipeline {
        event_tx,
        cache,
        hub,
        status,
        cancel,
        handle,
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn feed_payload(pipeline: &Pipeline, codec: &TickerCodec, payload: &str) {
    let tick = codec.normalize_text(payload).expect("payload normalizes");
    pipeline
        .event_tx
        .send(FeedEvent::Tick(tick))
        .await
        .unwrap();
}

#[tokio::test]
async fn raw_payloads_flow_to_cache_and_subscribers() {
    let pipeline = spawn_pipeline();
    let codec = TickerCodec::new("KRW");
    let mut rx = pipeline.hub.subscribe("KRW-BTC");

    pipeline.event_tx.send(FeedEvent::Connected).await.unwrap();
    feed_payload(
        &pipeline,
        &codec,
        r#"{"market":"KRW-BTC","trade_price":60000000,"prev_closing_price":59000000,"change":"RISE","acc_trade_price_24h":5000000000}"#,
    )
    .await;
    feed_payload(
        &pipeline,
        &codec,
        r#"{"cd":"KRW-BTC","tp":60500000,"pcp":59000000}"#,
    )
    .await;

    let first = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("first update")
        .unwrap();
    let second = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("second update")
        .unwrap();

    assert_eq!(first.sequence, 1);
    assert_eq!(first.tick.price, dec("60000000"));
    assert_eq!(first.tick.signed_change, Some(dec("-1000000")));
    assert_eq!(first.tick.acc_trade_value_24h, Some(dec("5000000000")));

    // Abbreviated field names land in the same market slot, in order.
    assert_eq!(second.sequence, 2);
    assert_eq!(second.tick.price, dec("60500000"));

    let cached = pipeline
        .cache
        .get(&MarketKey::normalize("krw-btc"))
        .unwrap();
    assert_eq!(cached.price, dec("60500000"));
    assert_eq!(pipeline.status.ticks_received(), 2);
    assert!(pipeline.status.is_connected());

    pipeline.cancel.cancel();
    pipeline.handle.await.unwrap();
}

#[tokio::test]
async fn malformed_frames_do_not_disturb_other_markets() {
    let pipeline = spawn_pipeline();
    let codec = TickerCodec::new("KRW");

    feed_payload(
        &pipeline,
        &codec,
        r#"{"market":"KRW-ETH","trade_price":5000000}"#,
    )
    .await;

    // Frames missing a market or price never become events at all; the
    // soft-failure contract is that existing cache entries stay intact.
    assert!(codec.normalize_text(r#"{"trade_price":1}"#).is_err());
    assert!(codec.normalize_text("garbage").is_err());

    feed_payload(
        &pipeline,
        &codec,
        r#"{"market":"KRW-BTC","trade_price":60000000}"#,
    )
    .await;

    // Closing the channel drains the pipeline before it exits.
    drop(pipeline.event_tx);
    pipeline.handle.await.unwrap();

    assert_eq!(pipeline.cache.len(), 2);
    let eth = pipeline
        .cache
        .get(&MarketKey::normalize("KRW-ETH"))
        .unwrap();
    assert_eq!(eth.price, dec("5000000"));
}

#[tokio::test]
async fn service_values_holdings_against_live_cache() {
    let pipeline = spawn_pipeline();
    let codec = TickerCodec::new("KRW");
    let service = TickerService::new(
        Arc::clone(&pipeline.cache),
        Arc::clone(&pipeline.hub),
        Arc::clone(&pipeline.status),
    );

    feed_payload(
        &pipeline,
        &codec,
        r#"{"market":"KRW-BTC","trade_price":60000000}"#,
    )
    .await;
    drop(pipeline.event_tx);
    pipeline.handle.await.unwrap();

    let position = HeldPosition {
        market: MarketKey::normalize("KRW-BTC"),
        quantity: dec("0.5"),
        avg_buy_price: dec("50000000"),
        buy_amount: dec("25000000"),
    };

    // Tick-derived valuation.
    let valuation = service.value_position(&position, None);
    assert_eq!(valuation.eval_amount, dec("30000000"));
    assert_eq!(valuation.profit, dec("5000000"));
    assert_eq!(valuation.profit_rate, dec("20"));

    // A populated server valuation wins over the tick.
    let server = Valuation {
        eval_amount: dec("29000000"),
        profit: dec("4000000"),
        profit_rate: dec("16"),
    };
    let mut server_valuations = HashMap::new();
    server_valuations.insert(MarketKey::normalize("KRW-BTC"), server);

    let valued = service.value_positions(std::slice::from_ref(&position), &server_valuations);
    assert_eq!(valued.len(), 1);
    assert_eq!(valued[0].valuation, server);

    // An uncached market falls back to its cost basis.
    let unknown = HeldPosition {
        market: MarketKey::normalize("KRW-DOGE"),
        quantity: dec("1000"),
        avg_buy_price: dec("500"),
        buy_amount: dec("500000"),
    };
    let fallback = service.value_position(&unknown, None);
    assert_eq!(fallback.eval_amount, dec("500000"));
    assert_eq!(fallback.profit, Decimal::ZERO);
}

#[tokio::test]
async fn reconnect_events_surface_in_status() {
    let pipeline = spawn_pipeline();

    pipeline.event_tx.send(FeedEvent::Connected).await.unwrap();
    pipeline
        .event_tx
        .send(FeedEvent::Disconnected)
        .await
        .unwrap();
    pipeline
        .event_tx
        .send(FeedEvent::Reconnecting { attempt: 2 })
        .await
        .unwrap();
    pipeline.event_tx.send(FeedEvent::Connected).await.unwrap();

    drop(pipeline.event_tx);
    pipeline.handle.await.unwrap();

    // Reconnect counter resets once the feed is back.
    assert!(pipeline.status.is_connected());
    assert_eq!(pipeline.status.reconnect_attempts(), 0);
    pipeline.cancel.cancel();
}

#[tokio::test]
async fn snapshot_reflects_all_markets_seen() {
    let pipeline = spawn_pipeline();
    let codec = TickerCodec::new("KRW");

    for payload in [
        r#"{"market":"KRW-BTC","trade_price":60000000}"#,
        r#"{"symbol":"KRW-ETH","tradePrice":5000000}"#,
        r#"{"cd":"KRW-XRP","tp":800}"#,
    ] {
        feed_payload(&pipeline, &codec, payload).await;
    }

    drop(pipeline.event_tx);
    pipeline.handle.await.unwrap();

    let snapshot = pipeline.cache.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[&MarketKey::normalize("KRW-XRP")].price, dec("800"));
}
