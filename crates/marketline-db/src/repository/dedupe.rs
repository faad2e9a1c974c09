//! SurrealDB implementation of [`DedupeCache`] for deployments that run
//! more than one process.
//!
//! A claim is an `alert_lock` record keyed by the dedupe key and stamped
//! with a per-call claimant id. Record ids are unique, so of two racing
//! `CREATE`s at most one stores its row; reading the claimant back tells
//! each caller whether it won. Expired claims are deleted right before
//! the `CREATE`.

use chrono::{DateTime, TimeDelta, Utc};
use marketline_core::error::{MarketError, MarketResult};
use marketline_core::repository::DedupeCache;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct LockRow {
    claimant: String,
}

#[derive(Clone)]
pub struct SurrealDedupeCache<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDedupeCache<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Remove every claim that has expired by `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> MarketResult<()> {
        self.db
            .query("DELETE alert_lock WHERE expires_at <= $now")
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }
}

impl<C: Connection> DedupeCache for SurrealDedupeCache<C> {
    async fn acquire(&self, key: &str, now: DateTime<Utc>, ttl: TimeDelta) -> MarketResult<bool> {
        let claimant = Uuid::new_v4().to_string();
        // The CREATE fails when the key is held; the SELECT shows who holds it.
        let mut response = self
            .db
            .query(
                "DELETE type::record('alert_lock', $key) WHERE expires_at <= $now; \
                 CREATE type::record('alert_lock', $key) SET \
                 claimant = $claimant, expires_at = $expires_at; \
                 SELECT claimant FROM type::record('alert_lock', $key);",
            )
            .bind(("key", key.to_string()))
            .bind(("now", now))
            .bind(("claimant", claimant.clone()))
            .bind(("expires_at", now + ttl))
            .await
            .map_err(DbError::from)?;

        let holders: Vec<LockRow> = response
            .take(2)
            .map_err(|e| MarketError::Cache(e.to_string()))?;
        match holders.first() {
            Some(holder) if holder.claimant == claimant => Ok(true),
            Some(_) => {
                debug!(key, "Dedupe key already held");
                Ok(false)
            }
            None => Err(MarketError::Cache(format!("claim for {key} was not stored"))),
        }
    }
}
