//! Tenant resolution.
//!
//! Strategies run in a fixed order and the first match wins:
//!
//! 1. the `Host` (port stripped) equals a shop's bound domain,
//! 2. the first host label is `shop-<id>`,
//! 3. the `X-Shop-Id` header,
//! 4. the `shop_id` query parameter.
//!
//! A matched shop that is not active fails the request with 503. No
//! match is not an error: platform and landing routes have no shop.

use marketline_core::models::shop::{Shop, ShopId, normalize_host};
use marketline_core::repository::ShopRepository;
use tracing::debug;

use crate::context::{RequestContext, SHOP_ID_HEADER, SHOP_ID_PARAM, parse_id};
use crate::error::GateError;
use crate::rejection::Rejection;

const SUBDOMAIN_PREFIX: &str = "shop-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Domain,
    Subdomain,
    Header,
    Query,
}

impl Strategy {
    pub const ORDER: [Strategy; 4] = [
        Strategy::Domain,
        Strategy::Subdomain,
        Strategy::Header,
        Strategy::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Domain => "domain",
            Strategy::Subdomain => "subdomain",
            Strategy::Header => "header",
            Strategy::Query => "query",
        }
    }
}

pub struct TenantResolver<S: ShopRepository> {
    shops: S,
}

impl<S: ShopRepository> TenantResolver<S> {
    pub fn new(shops: S) -> Self {
        Self { shops }
    }

    /// Resolve the request's shop, at most once per request.
    ///
    /// Later calls with the same context return the memoized result
    /// without touching the store.
    pub async fn resolve<'a>(&self, ctx: &'a RequestContext) -> Result<Option<&'a Shop>, GateError> {
        let shop = ctx
            .shop
            .get_or_try_init(|| self.lookup(ctx))
            .await?
            .as_ref();

        match shop {
            Some(shop) if !shop.is_active() => {
                debug!(shop_id = shop.id, status = %shop.status, "Resolved shop is not active");
                Err(Rejection::shop_unavailable().into())
            }
            other => Ok(other),
        }
    }

    async fn lookup(&self, ctx: &RequestContext) -> Result<Option<Shop>, GateError> {
        for strategy in Strategy::ORDER {
            if let Some(shop) = self.try_strategy(strategy, ctx).await? {
                debug!(
                    shop_id = shop.id,
                    strategy = strategy.as_str(),
                    "Resolved shop"
                );
                return Ok(Some(shop));
            }
        }
        Ok(None)
    }

    async fn try_strategy(
        &self,
        strategy: Strategy,
        ctx: &RequestContext,
    ) -> Result<Option<Shop>, GateError> {
        let host = ctx.host.as_deref().map(normalize_host);
        let shop = match strategy {
            Strategy::Domain => match host.as_deref() {
                Some(host) if !host.is_empty() => self.shops.find_by_domain(host).await?,
                _ => None,
            },
            Strategy::Subdomain => match host.as_deref().and_then(subdomain_shop_id) {
                Some(id) => self.shops.find_by_id(id).await?,
                None => None,
            },
            Strategy::Header => self.by_id(ctx.header(SHOP_ID_HEADER)).await?,
            Strategy::Query => self.by_id(ctx.query(SHOP_ID_PARAM)).await?,
        };
        Ok(shop)
    }

    async fn by_id(&self, raw: Option<&str>) -> Result<Option<Shop>, GateError> {
        match raw.and_then(parse_id) {
            Some(id) => Ok(self.shops.find_by_id(id).await?),
            None => Ok(None),
        }
    }
}

/// `shop-42.example.com` → `Some(42)`. Bare `shop-42` has no parent
/// domain and does not count as a subdomain.
pub fn subdomain_shop_id(host: &str) -> Option<ShopId> {
    let (label, rest) = host.split_once('.')?;
    if rest.is_empty() {
        return None;
    }
    parse_id(label.strip_prefix(SUBDOMAIN_PREFIX)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_pattern() {
        assert_eq!(subdomain_shop_id("shop-42.marketline.app"), Some(42));
        assert_eq!(subdomain_shop_id("shop-42"), None);
        assert_eq!(subdomain_shop_id("shop-abc.marketline.app"), None);
        assert_eq!(subdomain_shop_id("store-42.marketline.app"), None);
        assert_eq!(subdomain_shop_id("www.shop-42.marketline.app"), None);
    }

    #[test]
    fn strategy_order_is_fixed() {
        assert_eq!(
            Strategy::ORDER.map(|s| s.as_str()),
            ["domain", "subdomain", "header", "query"]
        );
    }
}
