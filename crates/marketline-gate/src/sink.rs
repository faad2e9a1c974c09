//! Alert publication.

use marketline_core::MarketResult;
use tracing::{debug, info, warn};

use crate::alerts::AlertBatch;
use crate::config::ChannelConfig;

/// Receiver of alert batches. Publishing never fails from the caller's
/// point of view.
pub trait AlertSink: Send + Sync {
    fn publish(&self, batch: &AlertBatch) -> impl Future<Output = ()> + Send;
}

/// Transport to the external notification channel (chat webhook, pager).
pub trait Delivery: Send + Sync {
    fn deliver(
        &self,
        endpoint: &str,
        token: &str,
        payload: &serde_json::Value,
    ) -> impl Future<Output = MarketResult<()>> + Send;
}

/// Sink that forwards batches to a configured channel.
///
/// A missing webhook URL or token turns publishing into a silent no-op.
pub struct ChannelSink<T: Delivery> {
    config: ChannelConfig,
    delivery: T,
}

impl<T: Delivery> ChannelSink<T> {
    pub fn new(config: ChannelConfig, delivery: T) -> Self {
        Self { config, delivery }
    }

    pub fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }
}

impl<T: Delivery> AlertSink for ChannelSink<T> {
    async fn publish(&self, batch: &AlertBatch) {
        let Some((endpoint, token)) = self.config.credentials() else {
            debug!(
                alerts = batch.alerts.len(),
                "Alert channel not configured, dropping batch"
            );
            return;
        };

        let payload = batch.payload();
        match self.delivery.deliver(endpoint, token, &payload).await {
            Ok(()) => info!(alerts = batch.alerts.len(), "Alert batch delivered"),
            Err(e) => warn!(error = %e, alerts = batch.alerts.len(), "Alert delivery failed"),
        }
    }
}

/// Sink that only logs. Used when no channel is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    async fn publish(&self, batch: &AlertBatch) {
        for alert in &batch.alerts {
            warn!(
                kind = alert.kind.as_str(),
                scope = %alert.scope,
                value = alert.value,
                threshold = alert.threshold,
                sample_size = alert.sample_size,
                "Threshold breached"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use marketline_core::MarketError;

    use super::*;
    use crate::alerts::{Alert, AlertKind, AlertScope};

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<(String, String, serde_json::Value)>>,
        fail: bool,
    }

    impl Delivery for Recording {
        async fn deliver(
            &self,
            endpoint: &str,
            token: &str,
            payload: &serde_json::Value,
        ) -> MarketResult<()> {
            if self.fail {
                return Err(MarketError::Delivery("connection refused".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((endpoint.into(), token.into(), payload.clone()));
            Ok(())
        }
    }

    fn batch() -> AlertBatch {
        AlertBatch::new(
            vec![Alert {
                kind: AlertKind::P95High,
                scope: AlertScope::Global,
                value: 1200.0,
                threshold: 900.0,
                sample_size: 40,
            }],
            Utc::now(),
        )
    }

    fn configured() -> ChannelConfig {
        ChannelConfig {
            webhook_url: Some("https://hooks.example/ops".into()),
            token: Some("secret".into()),
        }
    }

    #[tokio::test]
    async fn unconfigured_channel_is_a_no_op() {
        let sink = ChannelSink::new(ChannelConfig::default(), Recording::default());
        assert!(!sink.is_configured());
        sink.publish(&batch()).await;
        assert!(sink.delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn configured_channel_receives_payload() {
        let sink = ChannelSink::new(configured(), Recording::default());
        sink.publish(&batch()).await;

        let sent = sink.delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (endpoint, token, payload) = &sent[0];
        assert_eq!(endpoint, "https://hooks.example/ops");
        assert_eq!(token, "secret");
        assert_eq!(payload["type"], "threshold_breach");
        assert_eq!(payload["alerts"][0]["type"], "p95_high");
    }

    #[tokio::test]
    async fn delivery_errors_are_swallowed() {
        let sink = ChannelSink::new(
            configured(),
            Recording {
                fail: true,
                ..Default::default()
            },
        );
        sink.publish(&batch()).await;
    }
}
