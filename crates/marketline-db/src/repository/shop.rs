//! SurrealDB implementation of [`ShopRepository`].
//!
//! Shops are keyed by a numeric id allocated from the `_sequence` table
//! so that ids stay usable in `shop-<id>` subdomains and headers.

use chrono::{DateTime, Utc};
use marketline_core::error::{MarketError, MarketResult};
use marketline_core::models::shop::{
    CreateShop, PlatformSettings, Shop, ShopId, ShopStatus, UpdateShop, normalize_host,
};
use marketline_core::repository::{PaginatedResult, Pagination, ShopRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ShopRow {
    name: String,
    domain: Option<String>,
    status: String,
    platforms: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row including the record id via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct ShopRowWithId {
    record_id: String,
    name: String,
    domain: Option<String>,
    status: String,
    platforms: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct SequenceRow {
    value: u64,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_shop_status(s: &str) -> Result<ShopStatus, DbError> {
    match s {
        "active" => Ok(ShopStatus::Active),
        "suspended" => Ok(ShopStatus::Suspended),
        "pending" => Ok(ShopStatus::Pending),
        other => Err(DbError::decode("shop", format!("unknown status: {other}"))),
    }
}

fn parse_platforms(value: serde_json::Value) -> Result<PlatformSettings, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::decode("shop", e))
}

fn platforms_value(platforms: &PlatformSettings) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(platforms).map_err(|e| DbError::Query(e.to_string()))
}

fn parse_shop_id(raw: &str) -> Result<ShopId, DbError> {
    raw.parse()
        .map_err(|e| DbError::decode("shop", format!("invalid id {raw:?}: {e}")))
}

impl ShopRow {
    fn into_shop(self, id: ShopId) -> Result<Shop, DbError> {
        Ok(Shop {
            id,
            name: self.name,
            domain: self.domain,
            status: parse_shop_status(&self.status)?,
            platforms: parse_platforms(self.platforms)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ShopRowWithId {
    fn try_into_shop(self) -> Result<Shop, DbError> {
        Ok(Shop {
            id: parse_shop_id(&self.record_id)?,
            name: self.name,
            domain: self.domain,
            status: parse_shop_status(&self.status)?,
            platforms: parse_platforms(self.platforms)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Shop repository.
#[derive(Clone)]
pub struct SurrealShopRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealShopRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn next_id(&self) -> Result<ShopId, DbError> {
        let mut result = self
            .db
            .query(
                "UPSERT type::record('_sequence', 'shop') \
                 SET value = (value OR 0) + 1",
            )
            .await?;
        let rows: Vec<SequenceRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|r| r.value)
            .ok_or_else(|| DbError::Query("shop sequence returned no value".into()))
    }
}

impl<C: Connection> ShopRepository for SurrealShopRepository<C> {
    async fn create(&self, input: CreateShop) -> MarketResult<Shop> {
        let domain = input.domain.as_deref().map(normalize_host);
        if let Some(domain) = &domain
            && self.find_by_domain(domain).await?.is_some()
        {
            return Err(MarketError::AlreadyExists {
                entity: format!("shop with domain {domain}"),
            });
        }

        let id = self.next_id().await?;
        let id_str = id.to_string();
        let status = input.status.unwrap_or(ShopStatus::Active);
        let platforms = platforms_value(&input.platforms.unwrap_or_default())?;

        let result = self
            .db
            .query(
                "CREATE type::record('shop', $id) SET \
                 name = $name, domain = $domain, \
                 status = $status, platforms = $platforms",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("domain", domain))
            .bind(("status", status.as_str()))
            .bind(("platforms", platforms))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ShopRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "shop".into(),
            id: id_str,
        })?;

        Ok(row.into_shop(id)?)
    }

    async fn get_by_id(&self, id: ShopId) -> MarketResult<Shop> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| MarketError::not_found("shop", id))
    }

    async fn find_by_id(&self, id: ShopId) -> MarketResult<Option<Shop>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('shop', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ShopRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_shop(id)?)),
            None => Ok(None),
        }
    }

    async fn find_by_domain(&self, domain: &str) -> MarketResult<Option<Shop>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM shop \
                 WHERE domain = $domain LIMIT 1",
            )
            .bind(("domain", normalize_host(domain)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ShopRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_shop()?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: ShopId, input: UpdateShop) -> MarketResult<Shop> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.domain.is_some() {
            sets.push("domain = $domain");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.platforms.is_some() {
            sets.push("platforms = $platforms");
        }
        sets.push("updated_at = time::now()");

        let query = format!("UPDATE type::record('shop', $id) SET {}", sets.join(", "));

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(domain) = input.domain {
            builder = builder.bind(("domain", domain.as_deref().map(normalize_host)));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", status.as_str()));
        }
        if let Some(platforms) = input.platforms {
            builder = builder.bind(("platforms", platforms_value(&platforms)?));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ShopRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "shop".into(),
            id: id_str,
        })?;

        Ok(row.into_shop(id)?)
    }

    async fn list(&self, pagination: Pagination) -> MarketResult<PaginatedResult<Shop>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM shop GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM shop \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ShopRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_shop())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [ShopStatus::Active, ShopStatus::Suspended, ShopStatus::Pending] {
            assert_eq!(parse_shop_status(status.as_str()).unwrap(), status);
        }
        assert!(parse_shop_status("closed").is_err());
    }
}
