//! Periodic housekeeping: metric retention, subscription expiry and
//! stale alert claims.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use marketline_core::repository::MetricStore;
use marketline_db::repository::{SurrealClientRepository, SurrealDedupeCache, SurrealMetricStore};
use marketline_gate::config::{parse_secs, secs_to_delta};
use marketline_gate::{GateError, SubscriptionLifecycle};
use surrealdb::{Connection, Surreal};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceConfig {
    /// Request metrics older than this are deleted (default: 86400 = 24 hours).
    pub metric_retention_secs: u64,
    /// Time between two sweeps (default: 300 = 5 minutes).
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            metric_retention_secs: 86_400,
            interval_secs: 300,
        }
    }
}

impl MaintenanceConfig {
    pub fn from_env() -> Result<Self, GateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GateError> {
        let defaults = Self::default();
        Ok(Self {
            metric_retention_secs: parse_secs(
                &lookup,
                "MARKETLINE_METRIC_RETENTION_SECS",
                defaults.metric_retention_secs,
            )?,
            interval_secs: parse_secs(
                &lookup,
                "MARKETLINE_MAINTENANCE_INTERVAL_SECS",
                defaults.interval_secs,
            )?,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retention(&self) -> TimeDelta {
        secs_to_delta(self.metric_retention_secs)
    }
}

pub struct Maintenance<C: Connection> {
    config: MaintenanceConfig,
    metrics: SurrealMetricStore<C>,
    subscriptions: SubscriptionLifecycle<SurrealClientRepository<C>>,
    dedupe: SurrealDedupeCache<C>,
}

impl<C: Connection> Maintenance<C> {
    pub fn new(db: Surreal<C>, config: MaintenanceConfig) -> Self {
        Self {
            config,
            metrics: SurrealMetricStore::new(db.clone()),
            subscriptions: SubscriptionLifecycle::new(SurrealClientRepository::new(db.clone())),
            dedupe: SurrealDedupeCache::new(db),
        }
    }

    /// Run one sweep as of `now`. Each step logs its own failure and the
    /// remaining steps still run.
    pub async fn sweep(&self, now: DateTime<Utc>) {
        match self.metrics.prune_before(now - self.config.retention()).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Pruned request metrics"),
            Err(e) => error!(error = %e, "Metric retention failed"),
        }

        if let Err(e) = self.subscriptions.expire_lapsed(now.date_naive()).await {
            error!(error = %e, "Subscription expiry sweep failed");
        }

        if let Err(e) = self.dedupe.purge_expired(now).await {
            error!(error = %e, "Alert claim purge failed");
        }
    }

    /// Sweep on every interval tick until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.config.interval());
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = interval.tick() => self.sweep(Utc::now()).await,
                _ = &mut shutdown => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = MaintenanceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, MaintenanceConfig::default());
        assert_eq!(config.retention(), TimeDelta::hours(24));
        assert_eq!(config.interval(), Duration::from_secs(300));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = MaintenanceConfig::from_lookup(|key| {
            (key == "MARKETLINE_MAINTENANCE_INTERVAL_SECS").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, GateError::Config { .. }));
    }

    #[test]
    fn out_of_range_retention_is_rejected() {
        for raw in ["0", "10000000000000000", "18446744073709551615"] {
            let err = MaintenanceConfig::from_lookup(|key| {
                (key == "MARKETLINE_METRIC_RETENTION_SECS").then(|| raw.to_string())
            })
            .unwrap_err();
            assert!(
                matches!(err, GateError::Config { ref var, .. } if var == "MARKETLINE_METRIC_RETENTION_SECS"),
                "retention {raw} was accepted"
            );
        }
    }

    #[test]
    fn retention_is_tunable() {
        let config = MaintenanceConfig::from_lookup(|key| {
            (key == "MARKETLINE_METRIC_RETENTION_SECS").then(|| "3600".to_string())
        })
        .unwrap();
        assert_eq!(config.retention(), TimeDelta::hours(1));
    }

    #[tokio::test]
    async fn sweep_prunes_expired_metrics() {
        use marketline_core::models::metric::RequestMetric;
        use surrealdb::engine::local::Mem;

        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        marketline_db::run_migrations(&db).await.unwrap();

        let now = Utc::now();
        let metrics = SurrealMetricStore::new(db.clone());
        for age in [TimeDelta::minutes(5), TimeDelta::hours(30)] {
            metrics
                .record(RequestMetric {
                    shop_id: Some(1),
                    user_id: None,
                    method: "GET".into(),
                    path: "/".into(),
                    route_name: None,
                    status_code: 200,
                    duration_ms: 15,
                    is_error: false,
                    exception_class: None,
                    created_at: now - age,
                })
                .await
                .unwrap();
        }

        Maintenance::new(db, MaintenanceConfig::default())
            .sweep(now)
            .await;

        let left = metrics
            .samples_since(now - TimeDelta::days(7), None)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
    }
}
