//! Terminal responses produced by the gating steps.

use std::fmt;

use marketline_core::models::plan::QuotaOperation;
use marketline_core::models::shop::ShopStatus;
use serde::Serialize;
use serde_json::json;

/// A structured `{code, message, meta?}` response that ends the request.
///
/// `status` is the HTTP-equivalent status; it is not part of the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    #[serde(skip)]
    pub status: u16,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl Rejection {
    /// A shop matched but is not active.
    pub fn shop_unavailable() -> Self {
        Self {
            status: 503,
            code: "shop_unavailable",
            message: "shop unavailable".into(),
            meta: None,
        }
    }

    pub fn shop_inactive(status: ShopStatus) -> Self {
        Self {
            status: 403,
            code: "shop_inactive",
            message: format!("shop currently {status}"),
            meta: None,
        }
    }

    pub fn service_disabled() -> Self {
        Self {
            status: 403,
            code: "service_disabled",
            message: "service not enabled for this shop".into(),
            meta: None,
        }
    }

    pub fn quota_exceeded(operation: QuotaOperation, limit: u64) -> Self {
        Self {
            status: 429,
            code: "quota_exceeded",
            message: format!("plan limit reached for {}", operation.as_str()),
            meta: Some(json!({ "limit": limit, "operation": operation.as_str() })),
        }
    }

    /// `meta.limit`, for quota rejections.
    pub fn limit(&self) -> Option<u64> {
        self.meta.as_ref()?.get("limit")?.as_u64()
    }

    pub fn body(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "code": self.code }))
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status, self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_body_carries_limit() {
        let rejection = Rejection::quota_exceeded(QuotaOperation::CreateProduct, 50);
        assert_eq!(rejection.status, 429);
        assert_eq!(rejection.limit(), Some(50));
        assert_eq!(
            rejection.body(),
            json!({
                "code": "quota_exceeded",
                "message": "plan limit reached for create_product",
                "meta": { "limit": 50, "operation": "create_product" },
            })
        );
    }

    #[test]
    fn body_omits_empty_meta() {
        let body = Rejection::shop_inactive(ShopStatus::Suspended).body();
        assert_eq!(
            body,
            json!({ "code": "shop_inactive", "message": "shop currently suspended" })
        );
    }
}
