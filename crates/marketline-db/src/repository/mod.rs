//! SurrealDB repository implementations.

mod audit;
mod client;
mod dedupe;
mod metric;
mod plan;
mod shop;
mod usage;

pub use audit::SurrealAuditLogRepository;
pub use client::SurrealClientRepository;
pub use dedupe::SurrealDedupeCache;
pub use metric::SurrealMetricStore;
pub use plan::SurrealPlanRepository;
pub use shop::SurrealShopRepository;
pub use usage::SurrealUsageRepository;
