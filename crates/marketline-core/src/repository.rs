//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Shop-scoped queries take a
//! `shop_id` parameter; nothing here reads an ambient "current shop".

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::MarketResult;
use crate::models::{
    audit::AuditLogEntry,
    client::{Client, ClientStatusChanged, CreateClient},
    metric::{MetricSample, RequestMetric},
    plan::{CreatePlan, PricingPlan},
    shop::{CreateShop, Shop, ShopId, UpdateShop},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Shops, clients and plans
// ---------------------------------------------------------------------------

pub trait ShopRepository: Send + Sync {
    fn create(&self, input: CreateShop) -> impl Future<Output = MarketResult<Shop>> + Send;
    fn get_by_id(&self, id: ShopId) -> impl Future<Output = MarketResult<Shop>> + Send;
    /// Like [`get_by_id`](Self::get_by_id) but a missing shop is `None`.
    fn find_by_id(&self, id: ShopId) -> impl Future<Output = MarketResult<Option<Shop>>> + Send;
    /// Exact, case-insensitive match on the bound domain.
    fn find_by_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = MarketResult<Option<Shop>>> + Send;
    fn update(
        &self,
        id: ShopId,
        input: UpdateShop,
    ) -> impl Future<Output = MarketResult<Shop>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = MarketResult<PaginatedResult<Shop>>> + Send;
}

pub trait ClientRepository: Send + Sync {
    /// Create a client and project its status onto the shop.
    fn create(&self, input: CreateClient) -> impl Future<Output = MarketResult<Client>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MarketResult<Client>> + Send;
    fn find_by_shop(
        &self,
        shop_id: ShopId,
    ) -> impl Future<Output = MarketResult<Option<Client>>> + Send;

    /// Persist a status change: client status, projected shop status and
    /// an audit entry, all in one transaction.
    fn apply_status_change(
        &self,
        event: &ClientStatusChanged,
    ) -> impl Future<Output = MarketResult<Client>> + Send;

    /// Trial or active clients whose `subscription_end` is before `today`.
    fn list_lapsed(&self, today: NaiveDate)
    -> impl Future<Output = MarketResult<Vec<Client>>> + Send;
}

pub trait PlanRepository: Send + Sync {
    fn create(&self, input: CreatePlan) -> impl Future<Output = MarketResult<PricingPlan>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MarketResult<PricingPlan>> + Send;
    /// The plan of the shop's current subscription, if the shop has one.
    fn find_for_shop(
        &self,
        shop_id: ShopId,
    ) -> impl Future<Output = MarketResult<Option<PricingPlan>>> + Send;
}

pub trait AuditLogRepository: Send + Sync {
    /// Newest first.
    fn list_for_shop(
        &self,
        shop_id: ShopId,
    ) -> impl Future<Output = MarketResult<Vec<AuditLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Usage counters (products and orders belong to the catalog/checkout side)
// ---------------------------------------------------------------------------

pub trait UsageRepository: Send + Sync {
    fn count_products(&self, shop_id: ShopId) -> impl Future<Output = MarketResult<u64>> + Send;
    fn count_orders_since(
        &self,
        shop_id: ShopId,
        since: DateTime<Utc>,
    ) -> impl Future<Output = MarketResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Observability
// ---------------------------------------------------------------------------

/// Append-only store of [`RequestMetric`] rows.
pub trait MetricStore: Send + Sync {
    fn record(&self, metric: RequestMetric) -> impl Future<Output = MarketResult<()>> + Send;

    /// Samples created at or after `since`; all shops when `shop_id` is
    /// `None`.
    fn samples_since(
        &self,
        since: DateTime<Utc>,
        shop_id: Option<ShopId>,
    ) -> impl Future<Output = MarketResult<Vec<MetricSample>>> + Send;

    fn count_since(
        &self,
        shop_id: ShopId,
        since: DateTime<Utc>,
    ) -> impl Future<Output = MarketResult<u64>> + Send;

    /// Delete rows older than `cutoff`, returning how many were removed.
    fn prune_before(&self, cutoff: DateTime<Utc>)
    -> impl Future<Output = MarketResult<u64>> + Send;
}

/// Shared keyed cache with an atomic "insert if absent, with TTL"
/// primitive. Used to deduplicate alerts across concurrent requests.
pub trait DedupeCache: Send + Sync {
    /// Claim `key` until `now + ttl`. Returns `true` only for the caller
    /// that created the claim; an unexpired claim makes every other caller
    /// get `false`.
    fn acquire(
        &self,
        key: &str,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> impl Future<Output = MarketResult<bool>> + Send;
}

/// An absent store records nothing and reads as empty.
impl<M: MetricStore> MetricStore for Option<M> {
    async fn record(&self, metric: RequestMetric) -> MarketResult<()> {
        match self {
            Some(store) => store.record(metric).await,
            None => Ok(()),
        }
    }

    async fn samples_since(
        &self,
        since: DateTime<Utc>,
        shop_id: Option<ShopId>,
    ) -> MarketResult<Vec<MetricSample>> {
        match self {
            Some(store) => store.samples_since(since, shop_id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn count_since(&self, shop_id: ShopId, since: DateTime<Utc>) -> MarketResult<u64> {
        match self {
            Some(store) => store.count_since(shop_id, since).await,
            None => Ok(0),
        }
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> MarketResult<u64> {
        match self {
            Some(store) => store.prune_before(cutoff).await,
            None => Ok(0),
        }
    }
}
