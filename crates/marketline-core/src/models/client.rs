//! Client (subscription holder) domain model.
//!
//! A client wraps a shop with commercial state. The shop's status is a
//! projection of the client's status and is re-derived on every client
//! status change through [`ClientStatusChanged`].

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::shop::{ShopId, ShopStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Trial,
    Active,
    Suspended,
    Expired,
}

impl ClientStatus {
    /// Fixed mapping from commercial state to shop state.
    pub fn shop_status(&self) -> ShopStatus {
        match self {
            ClientStatus::Trial | ClientStatus::Active => ShopStatus::Active,
            ClientStatus::Suspended | ClientStatus::Expired => ShopStatus::Suspended,
        }
    }

    /// Whether a passed `subscription_end` should move this client to
    /// [`ClientStatus::Expired`].
    pub fn can_lapse(&self) -> bool {
        matches!(self, ClientStatus::Trial | ClientStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Trial => "trial",
            ClientStatus::Active => "active",
            ClientStatus::Suspended => "suspended",
            ClientStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    /// The shop this client holds a subscription for.
    pub shop_id: ShopId,
    pub name: String,
    pub status: ClientStatus,
    /// Plan of the current subscription.
    pub plan_id: Uuid,
    /// Last day of the paid (or trial) period; `None` for open-ended.
    pub subscription_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new client.
///
/// Creating a client also projects its status onto the shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClient {
    pub shop_id: ShopId,
    pub name: String,
    pub status: ClientStatus,
    pub plan_id: Uuid,
    pub subscription_end: Option<NaiveDate>,
}

/// Domain event emitted for every client status write.
///
/// The handler persisting it must update the client, the projected shop
/// status and the audit log in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientStatusChanged {
    pub client_id: Uuid,
    pub shop_id: ShopId,
    pub from: ClientStatus,
    pub to: ClientStatus,
    pub occurred_at: DateTime<Utc>,
}

impl ClientStatusChanged {
    pub fn new(client: &Client, to: ClientStatus, occurred_at: DateTime<Utc>) -> Self {
        Self {
            client_id: client.id,
            shop_id: client.shop_id,
            from: client.status,
            to,
            occurred_at,
        }
    }

    /// Shop status the event projects.
    pub fn shop_status(&self) -> ShopStatus {
        self.to.shop_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_projection_table() {
        assert_eq!(ClientStatus::Trial.shop_status(), ShopStatus::Active);
        assert_eq!(ClientStatus::Active.shop_status(), ShopStatus::Active);
        assert_eq!(ClientStatus::Suspended.shop_status(), ShopStatus::Suspended);
        assert_eq!(ClientStatus::Expired.shop_status(), ShopStatus::Suspended);
    }

    #[test]
    fn only_running_subscriptions_lapse() {
        assert!(ClientStatus::Trial.can_lapse());
        assert!(ClientStatus::Active.can_lapse());
        assert!(!ClientStatus::Suspended.can_lapse());
        assert!(!ClientStatus::Expired.can_lapse());
    }
}
