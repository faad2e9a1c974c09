//! Subscription status changes and their projection onto shops.
//!
//! A client's status decides whether its shop serves traffic: trial and
//! active keep the shop active, suspended and expired suspend it. Every
//! change goes through [`ClientStatusChanged`], which the repository
//! applies in one transaction together with the shop update and an
//! audit entry.

use chrono::{DateTime, NaiveDate, Utc};
use marketline_core::MarketResult;
use marketline_core::models::client::{Client, ClientStatus, ClientStatusChanged};
use marketline_core::repository::ClientRepository;
use tracing::{info, warn};
use uuid::Uuid;

pub struct SubscriptionLifecycle<C: ClientRepository> {
    clients: C,
}

impl<C: ClientRepository> SubscriptionLifecycle<C> {
    pub fn new(clients: C) -> Self {
        Self { clients }
    }

    pub async fn change_status(&self, client_id: Uuid, to: ClientStatus) -> MarketResult<Client> {
        self.change_status_at(client_id, to, Utc::now()).await
    }

    /// Move a client to `to`. Setting the current status again is a no-op
    /// and writes no audit entry.
    pub async fn change_status_at(
        &self,
        client_id: Uuid,
        to: ClientStatus,
        now: DateTime<Utc>,
    ) -> MarketResult<Client> {
        let client = self.clients.get_by_id(client_id).await?;
        if client.status == to {
            return Ok(client);
        }
        let event = ClientStatusChanged::new(&client, to, now);
        self.clients.apply_status_change(&event).await
    }

    /// Expire every trial or active client whose subscription ended
    /// before `today`. Returns how many were expired; a failure on one
    /// client does not stop the sweep.
    pub async fn expire_lapsed(&self, today: NaiveDate) -> MarketResult<usize> {
        let now = Utc::now();
        let lapsed = self.clients.list_lapsed(today).await?;
        let mut expired = 0;
        for client in &lapsed {
            let event = ClientStatusChanged::new(client, ClientStatus::Expired, now);
            match self.clients.apply_status_change(&event).await {
                Ok(_) => expired += 1,
                Err(e) => warn!(
                    error = %e,
                    client_id = %client.id,
                    shop_id = client.shop_id,
                    "Failed to expire lapsed subscription"
                ),
            }
        }
        if expired > 0 {
            info!(expired, candidates = lapsed.len(), "Expired lapsed subscriptions");
        }
        Ok(expired)
    }
}
