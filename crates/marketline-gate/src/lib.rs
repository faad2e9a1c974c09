//! Marketline Gate — the per-request tenant pipeline.
//!
//! Order of evaluation for every request:
//!
//! 1. [`TenantResolver`] picks the shop (domain, `shop-<id>` subdomain,
//!    `X-Shop-Id` header, `shop_id` query parameter).
//! 2. [`ServiceGate`] checks shop status and platform enablement.
//! 3. [`QuotaEnforcer`] checks plan limits for quota-gated writes.
//! 4. The business handler runs.
//! 5. [`MetricsRecorder`] stores one [`RequestMetric`] row, best-effort.
//! 6. [`AlertEvaluator`] recomputes window statistics and publishes
//!    deduplicated alerts through an [`AlertSink`].
//!
//! [`Gateway`] wires the steps together. Steps 1–3 may end the request
//! with a [`Rejection`]; steps 5–6 never affect the response.
//!
//! [`RequestMetric`]: marketline_core::models::metric::RequestMetric

pub mod alerts;
pub mod config;
pub mod context;
pub mod dedupe;
pub mod error;
pub mod pipeline;
pub mod quota;
pub mod recorder;
pub mod rejection;
pub mod resolver;
pub mod service_gate;
pub mod sink;
pub mod stats;
pub mod subscription;

pub use alerts::{Alert, AlertBatch, AlertEvaluator, AlertKind, AlertScope};
pub use config::{AlertConfig, ChannelConfig};
pub use context::RequestContext;
pub use dedupe::MemoryDedupeCache;
pub use error::{GateError, PipelineError};
pub use pipeline::Gateway;
pub use quota::{QuotaEnforcer, UsageLine, UsageSnapshot};
pub use recorder::{Failure, MetricsRecorder, ResponseStatus};
pub use rejection::Rejection;
pub use resolver::TenantResolver;
pub use service_gate::ServiceGate;
pub use sink::{AlertSink, ChannelSink, Delivery, LogSink};
pub use stats::WindowStats;
pub use subscription::SubscriptionLifecycle;
