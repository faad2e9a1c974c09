//! End-to-end tests of the gateway pipeline against in-memory SurrealDB.

mod common;

use std::cell::Cell;
use std::panic::AssertUnwindSafe;

use chrono::{TimeDelta, Utc};
use marketline_core::MarketError;
use marketline_core::models::client::ClientStatus;
use marketline_core::models::plan::QuotaOperation;
use marketline_core::repository::MetricStore;
use marketline_db::repository::{
    SurrealMetricStore, SurrealPlanRepository, SurrealShopRepository, SurrealUsageRepository,
};
use futures::FutureExt;
use marketline_gate::{AlertConfig, AlertKind, AlertScope, Gateway, MemoryDedupeCache, RequestContext};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use common::{BrokenMetricStore, RecordingSink, create_shop, plan, seed_products, subscribe};

type TestGateway<M> = Gateway<
    SurrealShopRepository<Db>,
    SurrealPlanRepository<Db>,
    SurrealUsageRepository<Db>,
    M,
    MemoryDedupeCache,
    RecordingSink,
>;

fn gateway(db: &Surreal<Db>, sink: RecordingSink) -> TestGateway<SurrealMetricStore<Db>> {
    Gateway::new(
        SurrealShopRepository::new(db.clone()),
        SurrealPlanRepository::new(db.clone()),
        SurrealUsageRepository::new(db.clone()),
        SurrealMetricStore::new(db.clone()),
        MemoryDedupeCache::new(),
        sink,
        AlertConfig::default(),
    )
}

#[tokio::test]
async fn handler_runs_for_a_healthy_shop() {
    let db = common::setup().await;
    let shop = create_shop(&db, "Healthy", Some("healthy.example.com")).await;
    let gateway = gateway(&db, RecordingSink::default());

    let ctx = RequestContext::new("GET", "/products")
        .with_route("products.index")
        .with_host("healthy.example.com");
    let ctx = &ctx;
    let shop_id = shop.id;
    let status = gateway
        .handle(ctx, None, move || async move {
            match ctx.resolved_shop() {
                Some(shop) if shop.id == shop_id => Ok::<u16, MarketError>(200),
                _ => Ok(404),
            }
        })
        .await
        .unwrap();
    assert_eq!(status, 200);

    let since = Utc::now() - TimeDelta::minutes(1);
    let samples = SurrealMetricStore::new(db)
        .samples_since(since, Some(shop.id))
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].status_code, 200);
}

#[tokio::test]
async fn platform_routes_run_without_a_shop() {
    let db = common::setup().await;
    let gateway = gateway(&db, RecordingSink::default());

    let ctx = RequestContext::new("GET", "/").with_host("marketline.app");
    let status = gateway
        .handle(&ctx, Some(QuotaOperation::CreateProduct), || async {
            Ok::<u16, MarketError>(200)
        })
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert!(ctx.resolved_shop().is_none());
}

#[tokio::test]
async fn disabled_platform_is_rejected_and_recorded() {
    let db = common::setup().await;
    let shop = create_shop(&db, "Web only", None).await;
    let gateway = gateway(&db, RecordingSink::default());

    let ctx = RequestContext::new("GET", "/products")
        .with_header("X-Shop-Id", shop.id.to_string())
        .with_header("X-Client-Platform", "ios");
    let ran = Cell::new(false);
    let ran = &ran;
    let err = gateway
        .handle(&ctx, None, move || async move {
            ran.set(true);
            Ok::<u16, MarketError>(200)
        })
        .await
        .unwrap_err();

    assert!(!ran.get());
    let rejection = err.rejection().unwrap();
    assert_eq!(rejection.status, 403);
    assert_eq!(rejection.code, "service_disabled");

    let samples = SurrealMetricStore::new(db)
        .samples_since(Utc::now() - TimeDelta::minutes(1), Some(shop.id))
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].status_code, 403);
}

#[tokio::test]
async fn quota_gated_write_is_rejected_at_the_limit() {
    let db = common::setup().await;
    let shop = create_shop(&db, "Full", None).await;
    subscribe(&db, shop.id, ClientStatus::Active, plan("Starter", Some(50), None)).await;
    seed_products(&db, shop.id, 50).await;
    let gateway = gateway(&db, RecordingSink::default());

    let ctx = RequestContext::new("POST", "/products")
        .with_body(json!({ "shop_id": shop.id, "name": "Mug" }))
        .with_query("shop_id", shop.id.to_string());
    let err = gateway
        .handle(&ctx, Some(QuotaOperation::CreateProduct), || async {
            Ok::<u16, MarketError>(201)
        })
        .await
        .unwrap_err();

    let rejection = err.rejection().unwrap();
    assert_eq!(rejection.status, 429);
    assert_eq!(rejection.body()["meta"]["limit"], 50);

    // Reads are not quota-gated.
    let ctx = RequestContext::new("GET", "/products").with_query("shop_id", shop.id.to_string());
    let status = gateway
        .handle(&ctx, None, || async { Ok::<u16, MarketError>(200) })
        .await
        .unwrap();
    assert_eq!(status, 200);
}

#[tokio::test]
async fn handler_errors_pass_through_unchanged() {
    let db = common::setup().await;
    let shop = create_shop(&db, "Faulty", None).await;
    let gateway = gateway(&db, RecordingSink::default());

    let ctx = RequestContext::new("POST", "/orders").with_header("X-Shop-Id", shop.id.to_string());
    let err = gateway
        .handle(&ctx, None, || async {
            Err::<u16, _>(MarketError::Validation {
                message: "cart is empty".into(),
            })
        })
        .await
        .unwrap_err();

    assert!(err.rejection().is_none());
    let handler_err = err.into_handler_error().unwrap();
    assert!(matches!(handler_err, MarketError::Validation { ref message } if message == "cart is empty"));

    let samples = SurrealMetricStore::new(db)
        .samples_since(Utc::now() - TimeDelta::minutes(1), Some(shop.id))
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].status_code, 500);
}

#[tokio::test]
async fn broken_metric_store_never_breaks_a_request() {
    let db = common::setup().await;
    let shop = create_shop(&db, "Unobserved", None).await;
    let sink = RecordingSink::default();
    let gateway: TestGateway<BrokenMetricStore> = Gateway::new(
        SurrealShopRepository::new(db.clone()),
        SurrealPlanRepository::new(db.clone()),
        SurrealUsageRepository::new(db.clone()),
        BrokenMetricStore,
        MemoryDedupeCache::new(),
        sink.clone(),
        AlertConfig::default(),
    );

    let ctx = RequestContext::new("GET", "/").with_header("X-Shop-Id", shop.id.to_string());
    let status = gateway
        .handle(&ctx, None, || async { Ok::<u16, MarketError>(200) })
        .await
        .unwrap();
    assert_eq!(status, 200);

    let ctx = RequestContext::new("GET", "/").with_header("X-Shop-Id", shop.id.to_string());
    let err = gateway
        .handle(&ctx, None, || async {
            Err::<u16, _>(MarketError::Internal("boom".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err.into_handler_error(), Some(MarketError::Internal(_))));
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn absent_metric_store_is_tolerated() {
    let db = common::setup().await;
    let sink = RecordingSink::default();
    let gateway: TestGateway<Option<SurrealMetricStore<Db>>> = Gateway::new(
        SurrealShopRepository::new(db.clone()),
        SurrealPlanRepository::new(db.clone()),
        SurrealUsageRepository::new(db.clone()),
        None,
        MemoryDedupeCache::new(),
        sink.clone(),
        AlertConfig::default(),
    );

    let ctx = RequestContext::new("GET", "/");
    let err = gateway
        .handle(&ctx, None, || async {
            Err::<u16, _>(MarketError::Internal("boom".into()))
        })
        .await
        .unwrap_err();
    assert!(err.into_handler_error().is_some());
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn claimed_shop_ids_only_raise_global_alerts() {
    let db = common::setup().await;
    let sink = RecordingSink::default();
    let dedupe = MemoryDedupeCache::new();
    let gateway = Gateway::new(
        SurrealShopRepository::new(db.clone()),
        SurrealPlanRepository::new(db.clone()),
        SurrealUsageRepository::new(db.clone()),
        SurrealMetricStore::new(db.clone()),
        dedupe.clone(),
        sink.clone(),
        AlertConfig::default(),
    );

    for claimed in 900_000..900_005 {
        let ctx = RequestContext::new("POST", "/orders").with_header("X-Shop-Id", claimed.to_string());
        let result = gateway
            .handle(&ctx, None, || async {
                Err::<u16, _>(MarketError::Internal("payment gateway timeout".into()))
            })
            .await;
        assert!(result.is_err());
        assert!(ctx.resolved_shop().is_none());
    }

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert!(
        batches[0]
            .alerts
            .iter()
            .all(|a| a.scope == AlertScope::Global)
    );
    assert_eq!(dedupe.len(), 1);

    // The claimed id is still kept on the metric row.
    let samples = SurrealMetricStore::new(db)
        .samples_since(Utc::now() - TimeDelta::minutes(1), Some(900_000))
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
}

#[tokio::test]
async fn handler_panic_is_recorded_then_resumed() {
    let db = common::setup().await;
    let shop = create_shop(&db, "Crashy", None).await;
    let sink = RecordingSink::default();
    let gateway = gateway(&db, sink.clone());

    let ctx = RequestContext::new("GET", "/products").with_header("X-Shop-Id", shop.id.to_string());
    let outcome = AssertUnwindSafe(gateway.handle(&ctx, None, || async {
        let stock: Vec<u16> = Vec::new();
        Ok::<u16, MarketError>(stock[0])
    }))
    .catch_unwind()
    .await;
    assert!(outcome.is_err());

    let samples = SurrealMetricStore::new(db)
        .samples_since(Utc::now() - TimeDelta::minutes(1), Some(shop.id))
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].status_code, 500);

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let scopes: Vec<_> = batches[0].alerts.iter().map(|a| a.scope).collect();
    assert_eq!(scopes, [AlertScope::Global, AlertScope::Shop(shop.id)]);
    assert!(
        batches[0]
            .alerts
            .iter()
            .all(|a| a.kind == AlertKind::CrashFreeLow)
    );
}
