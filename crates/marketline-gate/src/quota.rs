//! Plan quota enforcement.
//!
//! Counts are read at check time without locking, so two concurrent
//! writes can both pass when a shop sits one below its limit. The
//! products and orders tables belong to the catalog side and cannot be
//! locked from here.

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use marketline_core::models::plan::{PricingPlan, QuotaOperation};
use marketline_core::models::shop::{Shop, ShopId};
use marketline_core::repository::{MetricStore, PlanRepository, UsageRepository};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::GateError;
use crate::rejection::Rejection;

pub struct QuotaEnforcer<P: PlanRepository, U: UsageRepository> {
    plans: P,
    usage: U,
}

impl<P: PlanRepository, U: UsageRepository> QuotaEnforcer<P, U> {
    pub fn new(plans: P, usage: U) -> Self {
        Self { plans, usage }
    }

    pub async fn check(&self, shop: Option<&Shop>, operation: QuotaOperation) -> Result<(), GateError> {
        self.check_at(shop, operation, Utc::now()).await
    }

    /// Deny with 429 when the shop's usage for `operation` has reached
    /// its plan limit. No shop, no plan or no limit all allow.
    pub async fn check_at(
        &self,
        shop: Option<&Shop>,
        operation: QuotaOperation,
        now: DateTime<Utc>,
    ) -> Result<(), GateError> {
        let Some(shop) = shop else {
            return Ok(());
        };
        let Some(plan) = self.plans.find_for_shop(shop.id).await? else {
            debug!(shop_id = shop.id, "Shop has no plan, quota not enforced");
            return Ok(());
        };
        let Some(limit) = plan.limit_for(operation) else {
            return Ok(());
        };

        let used = self.used(shop.id, operation, now).await?;
        if used >= limit {
            info!(
                shop_id = shop.id,
                operation = operation.as_str(),
                used,
                limit,
                plan = %plan.name,
                "Quota exceeded"
            );
            return Err(Rejection::quota_exceeded(operation, limit).into());
        }
        Ok(())
    }

    async fn used(
        &self,
        shop_id: ShopId,
        operation: QuotaOperation,
        now: DateTime<Utc>,
    ) -> Result<u64, GateError> {
        let used = match operation {
            QuotaOperation::CreateProduct => self.usage.count_products(shop_id).await?,
            QuotaOperation::CreateOrder => {
                self.usage
                    .count_orders_since(shop_id, month_start(now))
                    .await?
            }
        };
        Ok(used)
    }

    /// Current consumption of every plan-limited resource.
    ///
    /// API requests are counted from the request metrics, so they lag by
    /// whatever the recorder failed to store.
    pub async fn usage<M: MetricStore>(
        &self,
        shop_id: ShopId,
        metrics: &M,
        now: DateTime<Utc>,
    ) -> Result<UsageSnapshot, GateError> {
        let plan = self.plans.find_for_shop(shop_id).await?;
        let limit = |f: fn(&PricingPlan) -> Option<u64>| plan.as_ref().and_then(f);

        Ok(UsageSnapshot {
            shop_id,
            plan_id: plan.as_ref().map(|p| p.id),
            products: UsageLine::new(
                self.usage.count_products(shop_id).await?,
                limit(|p| p.max_products),
            ),
            orders_this_month: UsageLine::new(
                self.usage
                    .count_orders_since(shop_id, month_start(now))
                    .await?,
                limit(|p| p.max_orders_per_month),
            ),
            api_requests_today: UsageLine::new(
                metrics.count_since(shop_id, day_start(now)).await?,
                limit(|p| p.max_api_requests_per_day),
            ),
            generated_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub shop_id: ShopId,
    pub plan_id: Option<Uuid>,
    pub products: UsageLine,
    pub orders_this_month: UsageLine,
    pub api_requests_today: UsageLine,
    pub generated_at: DateTime<Utc>,
}

/// One resource's consumption; `limit: None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageLine {
    pub used: u64,
    pub limit: Option<u64>,
}

impl UsageLine {
    pub fn new(used: u64, limit: Option<u64>) -> Self {
        Self { used, limit }
    }

    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }

    pub fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.used >= limit)
    }
}

/// Midnight UTC on the first day of `now`'s month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    today
        .with_day(1)
        .unwrap_or(today)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Midnight UTC of `now`'s day.
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn month_and_day_boundaries_are_utc() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 23, 59, 59).unwrap();
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            day_start(now),
            Utc.with_ymd_and_hms(2026, 3, 17, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn usage_lines() {
        let line = UsageLine::new(49, Some(50));
        assert_eq!(line.remaining(), Some(1));
        assert!(!line.exhausted());

        let line = UsageLine::new(51, Some(50));
        assert_eq!(line.remaining(), Some(0));
        assert!(line.exhausted());

        let line = UsageLine::new(10_000, None);
        assert_eq!(line.remaining(), None);
        assert!(!line.exhausted());
    }
}
