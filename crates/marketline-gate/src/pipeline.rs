use std::panic;

use marketline_core::models::plan::QuotaOperation;
use marketline_core::repository::{
    DedupeCache, MetricStore, PlanRepository, ShopRepository, UsageRepository,
};

use crate::alerts::AlertEvaluator;
use crate::config::AlertConfig;
use crate::context::RequestContext;
use crate::error::{GateError, PipelineError};
use crate::quota::QuotaEnforcer;
use crate::recorder::{Failure, MetricsRecorder, ResponseStatus};
use crate::resolver::TenantResolver;
use crate::service_gate::ServiceGate;
use crate::sink::AlertSink;

/// The full request pipeline: resolve, gate, enforce quota, run the
/// handler, record the metric and evaluate alerts.
///
/// Rejections are recorded like any other response. Recording and
/// alerting happen before `handle` returns but cannot change its result.
/// A panicking handler is recorded and alerted on, then the panic
/// continues.
pub struct Gateway<S, P, U, M, D, K>
where
    S: ShopRepository,
    P: PlanRepository,
    U: UsageRepository,
    M: MetricStore,
    D: DedupeCache,
    K: AlertSink,
{
    resolver: TenantResolver<S>,
    gate: ServiceGate,
    quota: QuotaEnforcer<P, U>,
    recorder: MetricsRecorder<M>,
    alerts: AlertEvaluator<M, P, D, K>,
}

impl<S, P, U, M, D, K> Gateway<S, P, U, M, D, K>
where
    S: ShopRepository,
    P: PlanRepository + Clone,
    U: UsageRepository,
    M: MetricStore + Clone,
    D: DedupeCache,
    K: AlertSink,
{
    pub fn new(
        shops: S,
        plans: P,
        usage: U,
        metrics: M,
        dedupe: D,
        sink: K,
        config: AlertConfig,
    ) -> Self {
        Self {
            resolver: TenantResolver::new(shops),
            gate: ServiceGate::new(),
            quota: QuotaEnforcer::new(plans.clone(), usage),
            recorder: MetricsRecorder::new(metrics.clone()),
            alerts: AlertEvaluator::new(metrics, plans, dedupe, sink, config),
        }
    }
}

impl<S, P, U, M, D, K> Gateway<S, P, U, M, D, K>
where
    S: ShopRepository,
    P: PlanRepository,
    U: UsageRepository,
    M: MetricStore,
    D: DedupeCache,
    K: AlertSink,
{
    pub fn resolver(&self) -> &TenantResolver<S> {
        &self.resolver
    }

    pub fn quota(&self) -> &QuotaEnforcer<P, U> {
        &self.quota
    }

    pub fn alerts(&self) -> &AlertEvaluator<M, P, D, K> {
        &self.alerts
    }

    /// Run `handler` behind the gating steps.
    ///
    /// `operation` marks quota-gated writes. The handler can read the
    /// resolved shop from `ctx.resolved_shop()`. Alerts get a shop scope
    /// only for a resolved shop; ids the client merely claims are kept
    /// on the metric row.
    pub async fn handle<T, E, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: Option<QuotaOperation>,
        handler: F,
    ) -> Result<T, PipelineError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: ResponseStatus,
        E: Failure,
    {
        let outcome = self
            .recorder
            .observe_caught(ctx, move || async move {
                let shop = self.resolver.resolve(ctx).await?;
                self.gate
                    .check(shop, ctx.platform())
                    .map_err(GateError::from)?;
                if let Some(operation) = operation {
                    self.quota.check(shop, operation).await?;
                }
                let response = handler().await.map_err(PipelineError::Handler)?;
                Ok::<T, PipelineError<E>>(response)
            })
            .await;

        self.alerts
            .evaluate(ctx.resolved_shop().map(|shop| shop.id))
            .await;
        match outcome {
            Ok(outcome) => outcome,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}
