//! SurrealDB implementation of [`ClientRepository`].
//!
//! Every write of a client's status also writes the projected shop
//! status inside the same transaction, so the two never disagree.

use chrono::{DateTime, NaiveDate, Utc};
use marketline_core::error::MarketResult;
use marketline_core::models::client::{
    Client, ClientStatus, ClientStatusChanged, CreateClient,
};
use marketline_core::models::shop::ShopId;
use marketline_core::repository::ClientRepository;
use serde_json::json;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::DbError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, SurrealValue)]
struct ClientRow {
    shop_id: u64,
    name: String,
    status: String,
    plan_id: String,
    subscription_end: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ClientRowWithId {
    record_id: String,
    shop_id: u64,
    name: String,
    status: String,
    plan_id: String,
    subscription_end: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Only used to check that a shop exists.
#[derive(Debug, SurrealValue)]
struct ShopStatusRow {
    #[allow(dead_code)]
    status: String,
}

fn parse_status(s: &str) -> Result<ClientStatus, DbError> {
    match s {
        "trial" => Ok(ClientStatus::Trial),
        "active" => Ok(ClientStatus::Active),
        "suspended" => Ok(ClientStatus::Suspended),
        "expired" => Ok(ClientStatus::Expired),
        other => Err(DbError::decode("client", format!("unknown status: {other}"))),
    }
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>, DbError> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| DbError::decode("client", format!("invalid date {s:?}: {e}")))
    })
    .transpose()
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn row_to_client(row: ClientRow, id: Uuid) -> Result<Client, DbError> {
    let plan_id = Uuid::parse_str(&row.plan_id)
        .map_err(|e| DbError::decode("client", format!("invalid plan UUID: {e}")))?;
    Ok(Client {
        id,
        shop_id: row.shop_id,
        name: row.name,
        status: parse_status(&row.status)?,
        plan_id,
        subscription_end: parse_date(row.subscription_end)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl ClientRowWithId {
    fn try_into_client(self) -> Result<Client, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::decode("client", format!("invalid UUID: {e}")))?;
        row_to_client(
            ClientRow {
                shop_id: self.shop_id,
                name: self.name,
                status: self.status,
                plan_id: self.plan_id,
                subscription_end: self.subscription_end,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            id,
        )
    }
}

/// SurrealDB implementation of the Client repository.
#[derive(Clone)]
pub struct SurrealClientRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealClientRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn ensure_shop(&self, shop_id: ShopId) -> Result<(), DbError> {
        let mut result = self
            .db
            .query("SELECT status FROM type::record('shop', $id)")
            .bind(("id", shop_id.to_string()))
            .await?;
        let rows: Vec<ShopStatusRow> = result.take(0)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "shop".into(),
                id: shop_id.to_string(),
            });
        }
        Ok(())
    }
}

impl<C: Connection> ClientRepository for SurrealClientRepository<C> {
    async fn create(&self, input: CreateClient) -> MarketResult<Client> {
        self.ensure_shop(input.shop_id).await?;

        let id = Uuid::new_v4();

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('client', $id) SET \
                 shop_id = $shop_id, name = $name, status = $status, \
                 plan_id = $plan_id, subscription_end = $subscription_end; \
                 UPDATE type::record('shop', $shop_key) SET \
                 status = $shop_status, updated_at = time::now(); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("shop_id", input.shop_id))
            .bind(("name", input.name))
            .bind(("status", input.status.as_str()))
            .bind(("plan_id", input.plan_id.to_string()))
            .bind(("subscription_end", format_date(input.subscription_end)))
            .bind(("shop_key", input.shop_id.to_string()))
            .bind(("shop_status", input.status.shop_status().as_str()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> MarketResult<Client> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('client', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClientRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "client".into(),
            id: id_str,
        })?;

        Ok(row_to_client(row, id)?)
    }

    async fn find_by_shop(&self, shop_id: ShopId) -> MarketResult<Option<Client>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM client \
                 WHERE shop_id = $shop_id LIMIT 1",
            )
            .bind(("shop_id", shop_id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClientRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_client()?)),
            None => Ok(None),
        }
    }

    async fn apply_status_change(&self, event: &ClientStatusChanged) -> MarketResult<Client> {
        let detail = json!({
            "client_id": event.client_id.to_string(),
            "from": event.from.as_str(),
            "to": event.to.as_str(),
            "shop_status": event.shop_status().as_str(),
        });

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE type::record('client', $client_id) SET \
                 status = $to, updated_at = time::now(); \
                 UPDATE type::record('shop', $shop_key) SET \
                 status = $shop_status, updated_at = time::now(); \
                 CREATE type::record('audit_log', $audit_id) SET \
                 shop_id = $shop_id, action = 'client.status_changed', \
                 detail = $detail, created_at = $occurred_at; \
                 COMMIT TRANSACTION;",
            )
            .bind(("client_id", event.client_id.to_string()))
            .bind(("to", event.to.as_str()))
            .bind(("shop_key", event.shop_id.to_string()))
            .bind(("shop_status", event.shop_status().as_str()))
            .bind(("audit_id", Uuid::new_v4().to_string()))
            .bind(("shop_id", event.shop_id))
            .bind(("detail", detail))
            .bind(("occurred_at", event.occurred_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(
            client_id = %event.client_id,
            shop_id = event.shop_id,
            from = %event.from,
            to = %event.to,
            shop_status = %event.shop_status(),
            "Client status changed"
        );

        self.get_by_id(event.client_id).await
    }

    async fn list_lapsed(&self, today: NaiveDate) -> MarketResult<Vec<Client>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM client \
                 WHERE status IN ['trial', 'active'] \
                 AND subscription_end != NONE \
                 AND subscription_end < $today \
                 ORDER BY subscription_end ASC",
            )
            .bind(("today", today.format(DATE_FORMAT).to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClientRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(|row| row.try_into_client())
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
