//! SurrealDB implementation of [`PlanRepository`].

use chrono::{DateTime, Utc};
use marketline_core::error::MarketResult;
use marketline_core::models::plan::{CreatePlan, PricingPlan};
use marketline_core::models::shop::ShopId;
use marketline_core::repository::PlanRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PlanRow {
    name: String,
    max_products: Option<u64>,
    max_orders_per_month: Option<u64>,
    max_api_requests_per_day: Option<u64>,
    features: serde_json::Value,
    web_enabled: bool,
    android_enabled: bool,
    ios_enabled: bool,
    created_at: DateTime<Utc>,
}

impl PlanRow {
    fn into_plan(self, id: Uuid) -> PricingPlan {
        PricingPlan {
            id,
            name: self.name,
            max_products: self.max_products,
            max_orders_per_month: self.max_orders_per_month,
            max_api_requests_per_day: self.max_api_requests_per_day,
            features: self.features,
            web_enabled: self.web_enabled,
            android_enabled: self.android_enabled,
            ios_enabled: self.ios_enabled,
            created_at: self.created_at,
        }
    }
}

/// SurrealDB implementation of the PricingPlan repository.
#[derive(Clone)]
pub struct SurrealPlanRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPlanRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PlanRepository for SurrealPlanRepository<C> {
    async fn create(&self, input: CreatePlan) -> MarketResult<PricingPlan> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let features = input
            .features
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('pricing_plan', $id) SET \
                 name = $name, \
                 max_products = $max_products, \
                 max_orders_per_month = $max_orders_per_month, \
                 max_api_requests_per_day = $max_api_requests_per_day, \
                 features = $features, \
                 web_enabled = $web_enabled, \
                 android_enabled = $android_enabled, \
                 ios_enabled = $ios_enabled",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("max_products", input.max_products))
            .bind(("max_orders_per_month", input.max_orders_per_month))
            .bind(("max_api_requests_per_day", input.max_api_requests_per_day))
            .bind(("features", features))
            .bind(("web_enabled", input.web_enabled))
            .bind(("android_enabled", input.android_enabled))
            .bind(("ios_enabled", input.ios_enabled))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PlanRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "pricing_plan".into(),
            id: id_str,
        })?;

        Ok(row.into_plan(id))
    }

    async fn get_by_id(&self, id: Uuid) -> MarketResult<PricingPlan> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('pricing_plan', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PlanRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "pricing_plan".into(),
            id: id_str,
        })?;

        Ok(row.into_plan(id))
    }

    async fn find_for_shop(&self, shop_id: ShopId) -> MarketResult<Option<PricingPlan>> {
        let mut result = self
            .db
            .query("SELECT VALUE plan_id FROM client WHERE shop_id = $shop_id LIMIT 1")
            .bind(("shop_id", shop_id))
            .await
            .map_err(DbError::from)?;

        let plan_ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        let Some(plan_id) = plan_ids.into_iter().next() else {
            return Ok(None);
        };
        let plan_id = Uuid::parse_str(&plan_id)
            .map_err(|e| DbError::decode("client", format!("invalid plan UUID: {e}")))?;

        self.get_by_id(plan_id).await.map(Some)
    }
}
