//! Shared fixtures for the gate integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use marketline_core::models::client::{Client, ClientStatus, CreateClient};
use marketline_core::models::metric::{MetricSample, RequestMetric};
use marketline_core::models::plan::{CreatePlan, PricingPlan};
use marketline_core::models::shop::{
    CreateShop, PlatformSettings, Shop, ShopId, ShopStatus, UpdateShop,
};
use marketline_core::repository::{
    ClientRepository, MetricStore, PaginatedResult, Pagination, PlanRepository, ShopRepository,
};
use marketline_core::{MarketError, MarketResult};
use marketline_db::repository::{
    SurrealClientRepository, SurrealPlanRepository, SurrealShopRepository,
};
use marketline_gate::{AlertBatch, AlertSink};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// Helper: spin up in-memory DB and run migrations.
pub async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    marketline_db::run_migrations(&db).await.unwrap();
    db
}

pub async fn create_shop(db: &Surreal<Db>, name: &str, domain: Option<&str>) -> Shop {
    create_shop_with(db, name, domain, PlatformSettings::default()).await
}

pub async fn create_shop_with(
    db: &Surreal<Db>,
    name: &str,
    domain: Option<&str>,
    platforms: PlatformSettings,
) -> Shop {
    SurrealShopRepository::new(db.clone())
        .create(CreateShop {
            name: name.into(),
            domain: domain.map(Into::into),
            status: Some(ShopStatus::Active),
            platforms: Some(platforms),
        })
        .await
        .unwrap()
}

pub fn plan(name: &str, max_products: Option<u64>, max_orders: Option<u64>) -> CreatePlan {
    CreatePlan {
        name: name.into(),
        max_products,
        max_orders_per_month: max_orders,
        max_api_requests_per_day: None,
        features: None,
        web_enabled: true,
        android_enabled: false,
        ios_enabled: false,
    }
}

/// Create a plan and a client holding it for `shop_id`.
pub async fn subscribe(
    db: &Surreal<Db>,
    shop_id: ShopId,
    status: ClientStatus,
    plan: CreatePlan,
) -> (Client, PricingPlan) {
    let plan = SurrealPlanRepository::new(db.clone())
        .create(plan)
        .await
        .unwrap();
    let client = SurrealClientRepository::new(db.clone())
        .create(CreateClient {
            shop_id,
            name: "Owner".into(),
            status,
            plan_id: plan.id,
            subscription_end: None,
        })
        .await
        .unwrap();
    (client, plan)
}

pub async fn seed_products(db: &Surreal<Db>, shop_id: ShopId, count: usize) {
    for _ in 0..count {
        db.query("CREATE product SET shop_id = $shop_id")
            .bind(("shop_id", shop_id))
            .await
            .unwrap()
            .check()
            .unwrap();
    }
}

pub async fn seed_order(db: &Surreal<Db>, shop_id: ShopId, created_at: DateTime<Utc>) {
    db.query("CREATE shop_order SET shop_id = $shop_id, created_at = $created_at")
        .bind(("shop_id", shop_id))
        .bind(("created_at", created_at))
        .await
        .unwrap()
        .check()
        .unwrap();
}

/// Sink that keeps every published batch.
#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<AlertBatch>>>,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<AlertBatch> {
        self.batches.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingSink {
    async fn publish(&self, batch: &AlertBatch) {
        self.batches.lock().unwrap().push(batch.clone());
    }
}

/// Metric store whose backing table is gone.
#[derive(Clone, Default)]
pub struct BrokenMetricStore;

impl MetricStore for BrokenMetricStore {
    async fn record(&self, _metric: RequestMetric) -> MarketResult<()> {
        Err(MarketError::Database("table request_metric does not exist".into()))
    }

    async fn samples_since(
        &self,
        _since: DateTime<Utc>,
        _shop_id: Option<ShopId>,
    ) -> MarketResult<Vec<MetricSample>> {
        Err(MarketError::Database("table request_metric does not exist".into()))
    }

    async fn count_since(&self, _shop_id: ShopId, _since: DateTime<Utc>) -> MarketResult<u64> {
        Err(MarketError::Database("table request_metric does not exist".into()))
    }

    async fn prune_before(&self, _cutoff: DateTime<Utc>) -> MarketResult<u64> {
        Err(MarketError::Database("table request_metric does not exist".into()))
    }
}

/// Shop repository that counts lookups made through it.
#[derive(Clone)]
pub struct CountingShops {
    inner: SurrealShopRepository<Db>,
    lookups: Arc<AtomicUsize>,
}

impl CountingShops {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            inner: SurrealShopRepository::new(db),
            lookups: Arc::default(),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ShopRepository for CountingShops {
    async fn create(&self, input: CreateShop) -> MarketResult<Shop> {
        self.inner.create(input).await
    }

    async fn get_by_id(&self, id: ShopId) -> MarketResult<Shop> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(id).await
    }

    async fn find_by_id(&self, id: ShopId) -> MarketResult<Option<Shop>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn find_by_domain(&self, domain: &str) -> MarketResult<Option<Shop>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_domain(domain).await
    }

    async fn update(&self, id: ShopId, input: UpdateShop) -> MarketResult<Shop> {
        self.inner.update(id, input).await
    }

    async fn list(&self, pagination: Pagination) -> MarketResult<PaginatedResult<Shop>> {
        self.inner.list(pagination).await
    }
}
