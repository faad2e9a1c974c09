//! Pricing plan domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Write operations that count against a plan limit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuotaOperation {
    CreateProduct,
    CreateOrder,
}

impl QuotaOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaOperation::CreateProduct => "create_product",
            QuotaOperation::CreateOrder => "create_order",
        }
    }
}

/// Limits and platform entitlements of a subscription.
///
/// Plans are immutable during a billing cycle. A `None` limit means
/// unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingPlan {
    pub id: Uuid,
    pub name: String,
    pub max_products: Option<u64>,
    pub max_orders_per_month: Option<u64>,
    pub max_api_requests_per_day: Option<u64>,
    /// Free-form feature map (e.g. `{"sla_p95_ms": 600}`).
    pub features: serde_json::Value,
    pub web_enabled: bool,
    pub android_enabled: bool,
    pub ios_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl PricingPlan {
    pub fn limit_for(&self, operation: QuotaOperation) -> Option<u64> {
        match operation {
            QuotaOperation::CreateProduct => self.max_products,
            QuotaOperation::CreateOrder => self.max_orders_per_month,
        }
    }

    /// Contractual p95 latency ceiling, if the plan sells one.
    pub fn sla_p95_ms(&self) -> Option<u64> {
        self.features.get("sla_p95_ms").and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
        })
    }
}

/// Fields required to create a new plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlan {
    pub name: String,
    pub max_products: Option<u64>,
    pub max_orders_per_month: Option<u64>,
    pub max_api_requests_per_day: Option<u64>,
    pub features: Option<serde_json::Value>,
    pub web_enabled: bool,
    pub android_enabled: bool,
    pub ios_enabled: bool,
}
