//! SurrealDB implementation of [`MetricStore`].

use chrono::{DateTime, Utc};
use marketline_core::error::MarketResult;
use marketline_core::models::metric::{MetricSample, RequestMetric};
use marketline_core::models::shop::ShopId;
use marketline_core::repository::MetricStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SampleRow {
    status_code: u32,
    duration_ms: u64,
}

impl SampleRow {
    fn into_sample(self) -> MetricSample {
        MetricSample {
            status_code: u16::try_from(self.status_code).unwrap_or(u16::MAX),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Append-only `request_metric` table.
#[derive(Clone)]
pub struct SurrealMetricStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMetricStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> MetricStore for SurrealMetricStore<C> {
    async fn record(&self, metric: RequestMetric) -> MarketResult<()> {
        self.db
            .query(
                "CREATE request_metric SET \
                 shop_id = $shop_id, user_id = $user_id, \
                 method = $method, path = $path, route_name = $route_name, \
                 status_code = $status_code, duration_ms = $duration_ms, \
                 is_error = $is_error, exception_class = $exception_class, \
                 created_at = $created_at",
            )
            .bind(("shop_id", metric.shop_id))
            .bind(("user_id", metric.user_id))
            .bind(("method", metric.method))
            .bind(("path", metric.path))
            .bind(("route_name", metric.route_name))
            .bind(("status_code", u32::from(metric.status_code)))
            .bind(("duration_ms", metric.duration_ms))
            .bind(("is_error", metric.is_error))
            .bind(("exception_class", metric.exception_class))
            .bind(("created_at", metric.created_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn samples_since(
        &self,
        since: DateTime<Utc>,
        shop_id: Option<ShopId>,
    ) -> MarketResult<Vec<MetricSample>> {
        let mut result = match shop_id {
            Some(shop_id) => self
                .db
                .query(
                    "SELECT status_code, duration_ms FROM request_metric \
                     WHERE shop_id = $shop_id AND created_at >= $since",
                )
                .bind(("shop_id", shop_id))
                .bind(("since", since))
                .await
                .map_err(DbError::from)?,
            None => self
                .db
                .query(
                    "SELECT status_code, duration_ms FROM request_metric \
                     WHERE created_at >= $since",
                )
                .bind(("since", since))
                .await
                .map_err(DbError::from)?,
        };

        let rows: Vec<SampleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(SampleRow::into_sample).collect())
    }

    async fn count_since(&self, shop_id: ShopId, since: DateTime<Utc>) -> MarketResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM request_metric \
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

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> MarketResult<u64> {
        // Counted from the rows this statement deleted.
        let mut result = self
            .db
            .query(
                "DELETE request_metric WHERE created_at < $cutoff \
                 RETURN BEFORE",
            )
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;
        let removed: Vec<SampleRow> = result.take(0).map_err(DbError::from)?;
        Ok(removed.len() as u64)
    }
}
