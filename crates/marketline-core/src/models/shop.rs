//! Shop (tenant) domain model.
//!
//! A shop is an independently configured storefront sharing the
//! platform's codebase and database. Every request is attributed to at
//! most one shop.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric shop identifier, as used in `shop-<id>` subdomains and the
/// `X-Shop-Id` header.
pub type ShopId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShopStatus {
    Active,
    Suspended,
    Pending,
}

impl ShopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShopStatus::Active => "active",
            ShopStatus::Suspended => "suspended",
            ShopStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ShopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client channel making the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Web,
    Android,
    Ios,
}

impl Platform {
    /// Normalize a client-supplied platform value. Anything that is not
    /// `web`, `android` or `ios` (after trimming, case-insensitive) is
    /// treated as web.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("android") => Platform::Android,
            Some("ios") => Platform::Ios,
            _ => Platform::Web,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provisioning state of a single platform for a shop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningStatus {
    #[default]
    Pending,
    Active,
    Disabled,
}

impl ProvisioningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningStatus::Pending => "pending",
            ProvisioningStatus::Active => "active",
            ProvisioningStatus::Disabled => "disabled",
        }
    }
}

/// Enablement flag plus provisioning status for one platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlatformAccess {
    pub enabled: bool,
    pub status: ProvisioningStatus,
}

impl PlatformAccess {
    pub fn active() -> Self {
        Self {
            enabled: true,
            status: ProvisioningStatus::Active,
        }
    }

    /// Usable only when the flag is on and provisioning has finished.
    pub fn is_usable(&self) -> bool {
        self.enabled && self.status == ProvisioningStatus::Active
    }
}

/// Per-platform settings of a shop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformSettings {
    pub web: PlatformAccess,
    pub android: PlatformAccess,
    pub ios: PlatformAccess,
}

impl PlatformSettings {
    pub fn get(&self, platform: Platform) -> PlatformAccess {
        match platform {
            Platform::Web => self.web,
            Platform::Android => self.android,
            Platform::Ios => self.ios,
        }
    }
}

impl Default for PlatformSettings {
    /// New shops get the web storefront; mobile apps are provisioned later.
    fn default() -> Self {
        Self {
            web: PlatformAccess::active(),
            android: PlatformAccess::default(),
            ios: PlatformAccess::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    /// Custom domain bound to the shop, lowercase, without port.
    pub domain: Option<String>,
    pub status: ShopStatus,
    pub platforms: PlatformSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    pub fn is_active(&self) -> bool {
        self.status == ShopStatus::Active
    }
}

/// Canonical form of a host or bound domain: trimmed, lowercased, with
/// any `:port` suffix (empty port included) and trailing dot removed.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Fields required to create a new shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShop {
    pub name: String,
    pub domain: Option<String>,
    /// Defaults to [`ShopStatus::Active`].
    pub status: Option<ShopStatus>,
    pub platforms: Option<PlatformSettings>,
}

/// Fields that can be updated on an existing shop.
///
/// `status` is meant for admin actions on shops without a client; for
/// subscribed shops the status follows the client (see
/// [`ClientStatus::shop_status`](crate::models::client::ClientStatus::shop_status)).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateShop {
    pub name: Option<String>,
    /// `Some(None)` unbinds the domain.
    pub domain: Option<Option<String>>,
    pub status: Option<ShopStatus>,
    pub platforms: Option<PlatformSettings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_are_normalized() {
        assert_eq!(normalize_host("Shop.Example.com:8080"), "shop.example.com");
        assert_eq!(normalize_host(" shop.example.com. "), "shop.example.com");
        assert_eq!(normalize_host("shop.example.com:"), "shop.example.com");
        assert_eq!(normalize_host("shop.example.com:http"), "shop.example.com:http");
    }

    #[test]
    fn platform_normalization_defaults_to_web() {
        assert_eq!(Platform::normalize(Some("android")), Platform::Android);
        assert_eq!(Platform::normalize(Some(" IOS ")), Platform::Ios);
        assert_eq!(Platform::normalize(Some("web")), Platform::Web);
        assert_eq!(Platform::normalize(Some("windows-phone")), Platform::Web);
        assert_eq!(Platform::normalize(None), Platform::Web);
    }

    #[test]
    fn platform_access_requires_flag_and_active_provisioning() {
        assert!(PlatformAccess::active().is_usable());
        assert!(
            !PlatformAccess {
                enabled: true,
                status: ProvisioningStatus::Pending,
            }
            .is_usable()
        );
        assert!(
            !PlatformAccess {
                enabled: false,
                status: ProvisioningStatus::Active,
            }
            .is_usable()
        );
    }
}
