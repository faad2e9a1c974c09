//! SurrealDB implementation of [`UsageRepository`].

use chrono::{DateTime, Utc};
use marketline_core::error::MarketResult;
use marketline_core::models::shop::ShopId;
use marketline_core::repository::UsageRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Counts catalog and checkout rows for quota checks.
///
/// Counts are plain reads: two concurrent creates can both pass a check
/// at `limit - 1`.
#[derive(Clone)]
pub struct SurrealUsageRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUsageRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UsageRepository for SurrealUsageRepository<C> {
    async fn count_products(&self, shop_id: ShopId) -> MarketResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM product \
                 WHERE shop_id = $shop_id GROUP ALL",
            )
            .bind(("shop_id", shop_id))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn count_orders_since(&self, shop_id: ShopId, since: DateTime<Utc>) -> MarketResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM shop_order \
                 WHERE shop_id = $shop_id AND created_at >= $since \
                 GROUP ALL",
            )
            .bind(("shop_id", shop_id))
            .bind(("since", since))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
