//! Per-request metric capture.
//!
//! [`MetricsRecorder::observe`] wraps the downstream invocation, times it
//! and stores one [`RequestMetric`]. The wrapped outcome is returned
//! unchanged; a failed write is logged and forgotten. A panicking
//! invocation is recorded as a 500 before the panic continues.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use marketline_core::MarketError;
use marketline_core::models::metric::RequestMetric;
use marketline_core::models::shop::ShopId;
use marketline_core::repository::MetricStore;
use tracing::{debug, warn};

use crate::context::{RequestContext, SHOP_ID_HEADER, SHOP_ID_PARAM, parse_id};
use crate::error::{GateError, PipelineError};

/// `exception_class` of an invocation that panicked.
pub const PANIC_CLASS: &str = "panic";

/// Outcome of an observed call; `Err` carries the panic payload.
pub type Caught<T> = Result<T, Box<dyn Any + Send>>;

/// Status code of a successful response.
pub trait ResponseStatus {
    fn status_code(&self) -> u16;
}

impl ResponseStatus for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}

impl<T> ResponseStatus for (u16, T) {
    fn status_code(&self) -> u16 {
        self.0
    }
}

/// How a failed invocation is recorded.
pub trait Failure {
    fn status_code(&self) -> u16 {
        500
    }

    /// Type tag stored as `exception_class`.
    fn failure_class(&self) -> Option<String> {
        Some(std::any::type_name::<Self>().to_string())
    }
}

impl Failure for MarketError {
    fn failure_class(&self) -> Option<String> {
        let variant = match self {
            MarketError::NotFound { .. } => "NotFound",
            MarketError::AlreadyExists { .. } => "AlreadyExists",
            MarketError::Validation { .. } => "Validation",
            MarketError::Database(_) => "Database",
            MarketError::Cache(_) => "Cache",
            MarketError::Delivery(_) => "Delivery",
            MarketError::Internal(_) => "Internal",
        };
        Some(format!("MarketError::{variant}"))
    }
}

impl Failure for GateError {
    fn status_code(&self) -> u16 {
        match self {
            GateError::Rejected(rejection) => rejection.status,
            _ => 500,
        }
    }

    fn failure_class(&self) -> Option<String> {
        match self {
            GateError::Rejected(_) => None,
            GateError::Store(e) => e.failure_class(),
            GateError::Config { .. } => Some("GateError::Config".into()),
        }
    }
}

impl<E: Failure> Failure for PipelineError<E> {
    fn status_code(&self) -> u16 {
        match self {
            PipelineError::Gate(e) => e.status_code(),
            PipelineError::Handler(e) => e.status_code(),
        }
    }

    fn failure_class(&self) -> Option<String> {
        match self {
            PipelineError::Gate(e) => e.failure_class(),
            PipelineError::Handler(e) => e.failure_class(),
        }
    }
}

pub struct MetricsRecorder<M: MetricStore> {
    store: M,
}

impl<M: MetricStore> MetricsRecorder<M> {
    pub fn new(store: M) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &M {
        &self.store
    }

    /// Run `f`, record its outcome, and hand the outcome back untouched.
    /// A panic in `f` is recorded and then resumed.
    pub async fn observe<T, E, F, Fut>(&self, ctx: &RequestContext, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: ResponseStatus,
        E: Failure,
    {
        match self.observe_caught(ctx, f).await {
            Ok(outcome) => outcome,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Like [`observe`](Self::observe) but hands a panic back to the
    /// caller instead of resuming it.
    pub async fn observe_caught<T, E, F, Fut>(
        &self,
        ctx: &RequestContext,
        f: F,
    ) -> Caught<Result<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: ResponseStatus,
        E: Failure,
    {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(async move { f().await })
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();

        let (status_code, exception_class) = match &outcome {
            Ok(Ok(response)) => (response.status_code(), None),
            Ok(Err(failure)) => (failure.status_code(), failure.failure_class()),
            Err(_) => {
                warn!(method = %ctx.method, path = %ctx.path, "Request handler panicked");
                (500, Some(PANIC_CLASS.to_string()))
            }
        };
        let metric = build_metric(ctx, status_code, exception_class, elapsed, Utc::now());
        self.record(metric).await;
        outcome
    }

    /// Store `metric`, swallowing any storage error.
    pub async fn record(&self, metric: RequestMetric) {
        match self.store.record(metric).await {
            Ok(()) => {}
            Err(e) => warn!(error = %e, "Failed to record request metric"),
        }
    }
}

pub fn build_metric(
    ctx: &RequestContext,
    status_code: u16,
    exception_class: Option<String>,
    elapsed: Duration,
    created_at: DateTime<Utc>,
) -> RequestMetric {
    let metric = RequestMetric {
        shop_id: attribute_shop(ctx),
        user_id: ctx.user_id.clone(),
        method: ctx.method.clone(),
        path: ctx.path.clone(),
        route_name: ctx.route_name.clone(),
        status_code,
        duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        is_error: status_code >= 500,
        exception_class,
        created_at,
    };
    debug!(
        shop_id = ?metric.shop_id,
        method = %metric.method,
        path = %metric.path,
        status_code,
        duration_ms = metric.duration_ms,
        "Request observed"
    );
    metric
}

/// Shop a metric is attributed to, independent of whether the resolver
/// ran: resolved shop, then the `shop_id`/`shop` route parameter, then
/// the body's `shop_id`, then the `X-Shop-Id` header.
pub fn attribute_shop(ctx: &RequestContext) -> Option<ShopId> {
    if let Some(shop) = ctx.resolved_shop() {
        return Some(shop.id);
    }
    [SHOP_ID_PARAM, "shop"]
        .into_iter()
        .find_map(|name| ctx.route_param(name).and_then(parse_id))
        .or_else(|| ctx.body_id(SHOP_ID_PARAM))
        .or_else(|| ctx.header(SHOP_ID_HEADER).and_then(parse_id))
}
