//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! Entries are written by other repositories inside their transactions;
//! this type only reads them back.

use chrono::{DateTime, Utc};
use marketline_core::error::MarketResult;
use marketline_core::models::audit::AuditLogEntry;
use marketline_core::models::shop::ShopId;
use marketline_core::repository::AuditLogRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    shop_id: u64,
    action: String,
    detail: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::decode("audit_log", format!("invalid UUID: {e}")))?;
        Ok(AuditLogEntry {
            id,
            shop_id: self.shop_id,
            action: self.action,
            detail: self.detail,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn list_for_shop(&self, shop_id: ShopId) -> MarketResult<Vec<AuditLogEntry>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM audit_log \
                 WHERE shop_id = $shop_id ORDER BY created_at DESC",
            )
            .bind(("shop_id", shop_id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
