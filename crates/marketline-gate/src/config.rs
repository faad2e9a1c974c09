//! Alerting and notification configuration.
//!
//! Every threshold can be tuned through the environment without a code
//! change; unset variables keep the defaults below.

use std::str::FromStr;

use chrono::TimeDelta;

use crate::error::GateError;

/// Thresholds and timing of the alert evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    /// Alert when the crash-free percentage drops below this (default: 97).
    pub crash_free_floor_pct: f64,
    /// Alert when the mean response time exceeds this (default: 800 ms).
    pub avg_ms_ceiling: f64,
    /// Alert when p95 exceeds this (default: 900 ms). Shops whose plan
    /// sells an SLA use the plan value instead.
    pub p95_ms_ceiling: u64,
    /// Minimum time between two alerts of the same kind and scope
    /// (default: 300 = 5 minutes).
    pub cooldown_secs: u64,
    /// Trailing window the statistics cover (default: 900 = 15 minutes).
    pub window_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            crash_free_floor_pct: 97.0,
            avg_ms_ceiling: 800.0,
            p95_ms_ceiling: 900,
            cooldown_secs: 300,
            window_secs: 900,
        }
    }
}

impl AlertConfig {
    pub fn from_env() -> Result<Self, GateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GateError> {
        let defaults = Self::default();
        Ok(Self {
            crash_free_floor_pct: parse_var(
                &lookup,
                "MARKETLINE_ALERT_CRASH_FREE_PCT",
                defaults.crash_free_floor_pct,
            )?,
            avg_ms_ceiling: parse_var(&lookup, "MARKETLINE_ALERT_AVG_MS", defaults.avg_ms_ceiling)?,
            p95_ms_ceiling: parse_var(&lookup, "MARKETLINE_ALERT_P95_MS", defaults.p95_ms_ceiling)?,
            cooldown_secs: parse_secs(
                &lookup,
                "MARKETLINE_ALERT_COOLDOWN_SECS",
                defaults.cooldown_secs,
            )?,
            window_secs: parse_secs(&lookup, "MARKETLINE_ALERT_WINDOW_SECS", defaults.window_secs)?,
        })
    }

    pub fn window(&self) -> TimeDelta {
        secs_to_delta(self.window_secs)
    }

    pub fn cooldown(&self) -> TimeDelta {
        secs_to_delta(self.cooldown_secs)
    }
}

/// Credentials of the external notification channel. The sink stays
/// silent unless both are present.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    pub webhook_url: Option<String>,
    pub token: Option<String>,
}

impl ChannelConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            webhook_url: non_blank(lookup("MARKETLINE_ALERT_WEBHOOK_URL")),
            token: non_blank(lookup("MARKETLINE_ALERT_TOKEN")),
        }
    }

    /// `(url, token)` when the channel is fully configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.webhook_url.as_deref()?, self.token.as_deref()?))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse `var` if set, otherwise return `default`.
pub fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, GateError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_blank(lookup(var)) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| GateError::Config {
            var: var.into(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// Upper bound for every duration setting (100 years).
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 86_400;

/// Parse a duration in whole seconds. Zero and anything above
/// [`MAX_DURATION_SECS`] is a configuration error.
pub fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: u64,
) -> Result<u64, GateError> {
    let secs: u64 = parse_var(lookup, var, default)?;
    if secs == 0 || secs > MAX_DURATION_SECS {
        return Err(GateError::Config {
            var: var.into(),
            message: format!("{secs}: must be between 1 and {MAX_DURATION_SECS} seconds"),
        });
    }
    Ok(secs)
}

/// Seconds as a [`TimeDelta`], clamped to [`MAX_DURATION_SECS`].
pub fn secs_to_delta(secs: u64) -> TimeDelta {
    TimeDelta::seconds(secs.min(MAX_DURATION_SECS) as i64)
}
