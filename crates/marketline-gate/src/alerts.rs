//! Threshold alerting over the trailing metrics window.
//!
//! After each recorded request the evaluator recomputes [`WindowStats`]
//! globally and, when the request was attributed to a shop, for that
//! shop. Every breached threshold claims a dedupe key for the cool-down
//! period; only freshly claimed breaches are published, batched into a
//! single event.
//!
//! Nothing here can fail a request. Store, plan, dedupe and sink errors
//! are logged and the affected scope is skipped.

use std::fmt;

use chrono::{DateTime, Utc};
use marketline_core::models::shop::ShopId;
use marketline_core::repository::{DedupeCache, MetricStore, PlanRepository};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::sink::AlertSink;
use crate::stats::WindowStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CrashFreeLow,
    AvgResponseHigh,
    P95High,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::CrashFreeLow => "crash_free_low",
            AlertKind::AvgResponseHigh => "avg_response_high",
            AlertKind::P95High => "p95_high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertScope {
    Global,
    Shop(ShopId),
}

impl AlertScope {
    pub fn shop_id(&self) -> Option<ShopId> {
        match self {
            AlertScope::Global => None,
            AlertScope::Shop(id) => Some(*id),
        }
    }
}

impl fmt::Display for AlertScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertScope::Global => f.write_str("global"),
            AlertScope::Shop(id) => write!(f, "shop:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub scope: AlertScope,
    /// Observed value: a percentage for crash-free, milliseconds otherwise.
    pub value: f64,
    pub threshold: f64,
    pub sample_size: u64,
}

impl Alert {
    /// `alert:<type>:global` or `alert:<type>:shop:<id>`.
    pub fn dedupe_key(&self) -> String {
        format!("alert:{}:{}", self.kind.as_str(), self.scope)
    }

    pub fn payload(&self) -> serde_json::Value {
        let mut payload = json!({
            "type": self.kind.as_str(),
            "scope": match self.scope {
                AlertScope::Global => "global",
                AlertScope::Shop(_) => "shop",
            },
            "value": self.value,
            "threshold": self.threshold,
            "sample_size": self.sample_size,
        });
        if let (AlertScope::Shop(id), Some(map)) = (self.scope, payload.as_object_mut()) {
            map.insert("shop_id".into(), json!(id));
        }
        payload
    }
}

/// The single event published per evaluation with new breaches.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertBatch {
    pub alerts: Vec<Alert>,
    pub generated_at: DateTime<Utc>,
}

impl AlertBatch {
    pub const EVENT_TYPE: &'static str = "threshold_breach";

    pub fn new(alerts: Vec<Alert>, generated_at: DateTime<Utc>) -> Self {
        Self {
            alerts,
            generated_at,
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        json!({
            "type": Self::EVENT_TYPE,
            "alerts": self.alerts.iter().map(Alert::payload).collect::<Vec<_>>(),
            "generated_at": self.generated_at.to_rfc3339(),
        })
    }
}

/// Thresholds that apply to one scope.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Thresholds {
    crash_free_floor_pct: f64,
    avg_ms_ceiling: f64,
    p95_ms_ceiling: u64,
}

impl Thresholds {
    /// Breaches are strict: a value sitting exactly on a threshold is fine.
    fn breaches(&self, scope: AlertScope, stats: &WindowStats) -> Vec<Alert> {
        let alert = |kind, value, threshold| Alert {
            kind,
            scope,
            value,
            threshold,
            sample_size: stats.total,
        };

        let mut alerts = Vec::new();
        if stats.crash_free_pct < self.crash_free_floor_pct {
            alerts.push(alert(
                AlertKind::CrashFreeLow,
                stats.crash_free_pct,
                self.crash_free_floor_pct,
            ));
        }
        if stats.avg_ms > self.avg_ms_ceiling {
            alerts.push(alert(
                AlertKind::AvgResponseHigh,
                stats.avg_ms,
                self.avg_ms_ceiling,
            ));
        }
        if stats.p95_ms > self.p95_ms_ceiling {
            alerts.push(alert(
                AlertKind::P95High,
                stats.p95_ms as f64,
                self.p95_ms_ceiling as f64,
            ));
        }
        alerts
    }
}

pub struct AlertEvaluator<M, P, D, K>
where
    M: MetricStore,
    P: PlanRepository,
    D: DedupeCache,
    K: AlertSink,
{
    metrics: M,
    plans: P,
    dedupe: D,
    sink: K,
    config: AlertConfig,
}

impl<M, P, D, K> AlertEvaluator<M, P, D, K>
where
    M: MetricStore,
    P: PlanRepository,
    D: DedupeCache,
    K: AlertSink,
{
    pub fn new(metrics: M, plans: P, dedupe: D, sink: K, config: AlertConfig) -> Self {
        Self {
            metrics,
            plans,
            dedupe,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub async fn evaluate(&self, shop_id: Option<ShopId>) {
        self.evaluate_at(shop_id, Utc::now()).await;
    }

    /// Evaluate the global scope and, if given, the shop's scope as of
    /// `now`. Returns the published batch, if any alert was new.
    pub async fn evaluate_at(&self, shop_id: Option<ShopId>, now: DateTime<Utc>) -> Option<AlertBatch> {
        let mut alerts = self.scan(AlertScope::Global, now).await;
        if let Some(id) = shop_id {
            alerts.extend(self.scan(AlertScope::Shop(id), now).await);
        }
        if alerts.is_empty() {
            return None;
        }

        info!(
            alerts = alerts.len(),
            kinds = ?alerts.iter().map(|a| a.kind.as_str()).collect::<Vec<_>>(),
            "Publishing threshold alerts"
        );
        let batch = AlertBatch::new(alerts, now);
        self.sink.publish(&batch).await;
        Some(batch)
    }

    async fn scan(&self, scope: AlertScope, now: DateTime<Utc>) -> Vec<Alert> {
        let since = now - self.config.window();
        let samples = match self.metrics.samples_since(since, scope.shop_id()).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %e, %scope, "Metric window unavailable, skipping alert evaluation");
                return Vec::new();
            }
        };

        let stats = WindowStats::from_samples(&samples);
        if stats.is_empty() {
            return Vec::new();
        }
        debug!(
            %scope,
            total = stats.total,
            errors = stats.errors,
            crash_free_pct = stats.crash_free_pct,
            avg_ms = stats.avg_ms,
            p95_ms = stats.p95_ms,
            "Window statistics"
        );

        let thresholds = self.thresholds(scope).await;
        let mut fresh = Vec::new();
        for alert in thresholds.breaches(scope, &stats) {
            let key = alert.dedupe_key();
            match self.dedupe.acquire(&key, now, self.config.cooldown()).await {
                Ok(true) => fresh.push(alert),
                Ok(false) => debug!(%key, "Alert suppressed during cool-down"),
                Err(e) => warn!(error = %e, %key, "Dedupe cache unavailable, alert dropped"),
            }
        }
        fresh
    }

    /// Global thresholds, with the p95 ceiling replaced by the shop plan's
    /// SLA when it has one.
    async fn thresholds(&self, scope: AlertScope) -> Thresholds {
        let global = Thresholds {
            crash_free_floor_pct: self.config.crash_free_floor_pct,
            avg_ms_ceiling: self.config.avg_ms_ceiling,
            p95_ms_ceiling: self.config.p95_ms_ceiling,
        };
        let AlertScope::Shop(shop_id) = scope else {
            return global;
        };

        match self.plans.find_for_shop(shop_id).await {
            Ok(plan) => Thresholds {
                p95_ms_ceiling: plan
                    .and_then(|p| p.sla_p95_ms())
                    .unwrap_or(global.p95_ms_ceiling),
                ..global
            },
            Err(e) => {
                warn!(error = %e, shop_id, "Plan lookup failed, using global p95 ceiling");
                global
            }
        }
    }
}
