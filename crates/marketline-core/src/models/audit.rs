//! Audit log domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::shop::ShopId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub shop_id: ShopId,
    /// Dotted action name (e.g. `client.status_changed`).
    pub action: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
