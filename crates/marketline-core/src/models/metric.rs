//! Request metric model.
//!
//! One row per completed or failed request. Rows are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shop::ShopId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestMetric {
    pub shop_id: Option<ShopId>,
    pub user_id: Option<String>,
    pub method: String,
    pub path: String,
    pub route_name: Option<String>,
    pub status_code: u16,
    pub duration_ms: u64,
    pub is_error: bool,
    /// Type tag of the failure that ended the request, if any.
    pub exception_class: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The two columns the alerting window needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricSample {
    pub status_code: u16,
    pub duration_ms: u64,
}
