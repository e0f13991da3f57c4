#![allow(missing_docs, clippy::unwrap_used)]

mod common;

use anyhow::Result;
use common::{config, harness, harness_with};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use strapi_cache_core::{
    CacheStore, CacheType, ChannelQueue, Error, QueryParams, RefreshWorker, RequestOptions,
    StrapiClient,
};

const V1: &str = r#"{"data":{"version":1}}"#;
const V2: &str = r#"{"data":{"version":2}}"#;

async fn homepage(client: &StrapiClient) -> strapi_cache_core::Result<serde_json::Value> {
    client
        .single("homepage", &QueryParams::new(), RequestOptions::new())
        .await
}

#[tokio::test]
async fn deferred_enqueues_once_per_day() -> Result<()> {
    let h = harness(config("deferred"), V1);

    // cold start: fetched synchronously and a refresh is queued
    assert_eq!(homepage(&h.client).await?, json!({"data": {"version": 1}}));
    assert_eq!(h.transport.calls(), 1);
    assert_eq!(h.queue.jobs().len(), 1);

    h.clock.advance(Duration::from_secs(3600 * 13));
    homepage(&h.client).await?;
    assert_eq!(h.queue.jobs().len(), 1, "same UTC day");

    // 10:00 + 14h is the next day
    h.clock.advance(Duration::from_secs(3600));
    homepage(&h.client).await?;
    homepage(&h.client).await?;
    assert_eq!(h.queue.jobs().len(), 2);
    assert_eq!(h.transport.calls(), 1, "deferred reads never wait on the CMS");

    let job = &h.queue.jobs()[1];
    assert_eq!(job.endpoint, "homepage");
    assert_eq!(
        job.cache_key,
        h.client.cache_key("homepage", &QueryParams::new(), false)
    );
    assert_eq!(job.base_url, common::BASE_URL);
    Ok(())
}

#[tokio::test]
async fn deferred_jobs_refresh_through_worker() -> Result<()> {
    let h = harness(config("deferred"), V1);
    homepage(&h.client).await?;

    h.transport.respond(200, V2);
    let worker = RefreshWorker::new(h.transport.clone(), h.store.clone());
    for job in h.queue.jobs() {
        assert!(worker.handle(&job).await?);
    }

    assert_eq!(homepage(&h.client).await?, json!({"data": {"version": 2}}));
    Ok(())
}

#[tokio::test]
async fn deferred_with_channel_queue() -> Result<()> {
    let transport = common::ScriptedTransport::new(200, V1);
    let store = Arc::new(strapi_cache_core::MemoryStore::new());
    let (queue, receiver) = ChannelQueue::new();
    let client = StrapiClient::builder(config("deferred"))
        .transport(transport.clone())
        .store(store.clone())
        .queue(Arc::new(queue))
        .build()?;

    let worker = RefreshWorker::new(transport.clone(), store.clone());
    homepage(&client).await?;
    transport.respond(200, V2);
    drop(client);

    assert_eq!(worker.run(receiver).await, 1);
    assert_eq!(store.len().await, 2, "value and last-update timestamp");
    let key = strapi_cache_core::CacheKeyBuilder::new(common::BASE_URL).build(
        "homepage",
        &QueryParams::new(),
        false,
    );
    assert_eq!(store.get(&key).await?, Some(json!({"data": {"version": 2}})));
    Ok(())
}

#[tokio::test]
async fn deferred_without_queue_behaves_like_normal() -> Result<()> {
    let mut cfg = config("deferred");
    cfg.cache_time = 60;
    let h = harness_with(cfg, V1, false);

    homepage(&h.client).await?;
    h.clock.advance(Duration::from_secs(59));
    homepage(&h.client).await?;
    assert_eq!(h.transport.calls(), 1);

    h.clock.advance(Duration::from_secs(1));
    homepage(&h.client).await?;
    assert_eq!(h.transport.calls(), 2);
    assert!(h.queue.jobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn deferred_cold_start_failure_is_not_cached() -> Result<()> {
    let h = harness(config("deferred"), V1);
    h.transport.respond(403, "");

    let err = homepage(&h.client).await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied { status: 403, .. }));

    let key = h.client.cache_key("homepage", &QueryParams::new(), false);
    assert!(!h.store.has(&key).await?);
    Ok(())
}

#[tokio::test]
async fn flexible_windows() -> Result<()> {
    let mut cfg = config("flexible");
    cfg.flexible_cache = [300, 600];
    let h = harness(cfg, V1);

    homepage(&h.client).await?;
    assert_eq!(h.transport.calls(), 1);

    // fresh: no fetch, no refresh
    h.clock.advance(Duration::from_secs(299));
    assert_eq!(homepage(&h.client).await?, json!({"data": {"version": 1}}));
    h.client.drain_background().await;
    assert_eq!(h.transport.calls(), 1);

    // stale: old value now, refreshed in the background
    h.transport.respond(200, V2);
    h.clock.advance(Duration::from_secs(1));
    assert_eq!(homepage(&h.client).await?, json!({"data": {"version": 1}}));
    h.client.drain_background().await;
    assert_eq!(h.transport.calls(), 2);
    assert_eq!(homepage(&h.client).await?, json!({"data": {"version": 2}}));
    assert_eq!(h.transport.calls(), 2);

    // expired: synchronous fetch
    h.clock.advance(Duration::from_secs(600));
    homepage(&h.client).await?;
    assert_eq!(h.transport.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn flexible_refreshes_are_single_flight() -> Result<()> {
    let h = harness(config("flexible"), V1);
    homepage(&h.client).await?;

    h.clock.advance(Duration::from_secs(400));
    homepage(&h.client).await?;
    homepage(&h.client).await?;
    homepage(&h.client).await?;
    h.client.drain_background().await;

    assert_eq!(h.transport.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn flexible_background_failure_keeps_stale_value() -> Result<()> {
    let h = harness(config("flexible"), V1);
    homepage(&h.client).await?;

    h.transport.respond(503, "");
    h.clock.advance(Duration::from_secs(400));
    assert_eq!(homepage(&h.client).await?, json!({"data": {"version": 1}}));
    h.client.drain_background().await;

    let key = h.client.cache_key("homepage", &QueryParams::new(), false);
    assert_eq!(
        h.store.get(&key).await?,
        Some(json!({"data": {"version": 1}}))
    );
    Ok(())
}

#[tokio::test]
async fn flexible_fetch_failure_forgets_orphaned_value() -> Result<()> {
    let h = harness(config("flexible"), V1);
    let key = h.client.cache_key("homepage", &QueryParams::new(), false);
    // a value without its created stamp is treated as a miss
    h.store.set(&key, json!({"data": {"version": 0}}), None).await?;

    h.transport.respond(500, "");
    let err = homepage(&h.client).await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied { status: 500, .. }));
    assert_eq!(h.transport.calls(), 1);
    assert!(!h.store.has(&key).await?);

    h.transport.respond(200, V1);
    assert_eq!(homepage(&h.client).await?, json!({"data": {"version": 1}}));
    assert_eq!(h.transport.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn flexible_refresh_completes_after_client_is_dropped() -> Result<()> {
    let h = harness(config("flexible"), V1);
    homepage(&h.client).await?;
    let key = h.client.cache_key("homepage", &QueryParams::new(), false);

    h.transport.respond(200, V2);
    h.clock.advance(Duration::from_secs(400));
    assert_eq!(homepage(&h.client).await?, json!({"data": {"version": 1}}));
    drop(h.client);

    let refreshed = json!({"data": {"version": 2}});
    for _ in 0..200 {
        if h.store.get(&key).await?.as_ref() == Some(&refreshed) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.store.get(&key).await?, Some(refreshed));
    assert_eq!(h.transport.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn per_call_flexible_window_is_validated() -> Result<()> {
    let h = harness(config("normal"), V1);
    let inverted = CacheType::Flexible {
        fresh: Duration::from_secs(600),
        total: Duration::from_secs(300),
    };

    let err = h
        .client
        .single(
            "homepage",
            &QueryParams::new(),
            RequestOptions::new().cache_type(inverted),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(h.transport.calls(), 0);
    Ok(())
}
