use marketline_core::models::shop::{Platform, Shop};
use tracing::debug;

use crate::rejection::Rejection;

/// Shop status and per-platform enablement check.
///
/// Stateless; evaluated fresh on every request so that suspensions and
/// platform toggles take effect immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceGate;

impl ServiceGate {
    pub fn new() -> Self {
        Self
    }

    /// Requests without a shop pass through.
    pub fn check(&self, shop: Option<&Shop>, platform: Platform) -> Result<(), Rejection> {
        let Some(shop) = shop else {
            return Ok(());
        };

        if !shop.is_active() {
            debug!(shop_id = shop.id, status = %shop.status, "Shop is not active");
            return Err(Rejection::shop_inactive(shop.status));
        }

        let access = shop.platforms.get(platform);
        if !access.is_usable() {
            debug!(
                shop_id = shop.id,
                platform = %platform,
                enabled = access.enabled,
                provisioning = access.status.as_str(),
                "Platform not enabled for shop"
            );
            return Err(Rejection::service_disabled());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use marketline_core::models::shop::{
        PlatformAccess, PlatformSettings, ProvisioningStatus, ShopStatus,
    };

    use super::*;

    fn shop(status: ShopStatus, platforms: PlatformSettings) -> Shop {
        Shop {
            id: 1,
            name: "Corner Store".into(),
            domain: None,
            status,
            platforms,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn everything_enabled() -> PlatformSettings {
        PlatformSettings {
            web: PlatformAccess::active(),
            android: PlatformAccess::active(),
            ios: PlatformAccess::active(),
        }
    }

    #[test]
    fn no_shop_passes() {
        assert!(ServiceGate.check(None, Platform::Ios).is_ok());
    }

    #[test]
    fn inactive_shop_is_denied_on_every_platform() {
        for status in [ShopStatus::Suspended, ShopStatus::Pending] {
            let shop = shop(status, everything_enabled());
            for platform in [Platform::Web, Platform::Android, Platform::Ios] {
                let rejection = ServiceGate.check(Some(&shop), platform).unwrap_err();
                assert_eq!(rejection.status, 403);
                assert_eq!(rejection.code, "shop_inactive");
                assert_eq!(rejection.message, format!("shop currently {status}"));
            }
        }
    }

    #[test]
    fn platform_needs_flag_and_active_provisioning() {
        let mut platforms = everything_enabled();
        platforms.android.status = ProvisioningStatus::Pending;
        platforms.ios.enabled = false;
        let shop = shop(ShopStatus::Active, platforms);

        assert!(ServiceGate.check(Some(&shop), Platform::Web).is_ok());
        for platform in [Platform::Android, Platform::Ios] {
            let rejection = ServiceGate.check(Some(&shop), platform).unwrap_err();
            assert_eq!(rejection.status, 403);
            assert_eq!(rejection.code, "service_disabled");
        }
    }
}
