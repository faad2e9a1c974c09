//! Transport-neutral view of an inbound request.
//!
//! The hosting transport builds one `RequestContext` per request and
//! passes it by reference to every pipeline step. The resolved shop is
//! memoized here, so repeated lookups within a request hit the store
//! once and nothing leaks into the next request.

use std::collections::HashMap;

use marketline_core::models::shop::{Platform, Shop, ShopId};
use tokio::sync::OnceCell;

pub const SHOP_ID_HEADER: &str = "x-shop-id";
pub const PLATFORM_HEADER: &str = "x-client-platform";
pub const SHOP_ID_PARAM: &str = "shop_id";

#[derive(Debug, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub route_name: Option<String>,
    /// Raw `Host` header, possibly with a port.
    pub host: Option<String>,
    /// Identity derived from the bearer token, if any.
    pub user_id: Option<String>,
    pub body: Option<serde_json::Value>,
    /// Keys are stored lowercase.
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    route_params: HashMap<String, String>,
    pub(crate) shop: OnceCell<Option<Shop>>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_route(mut self, name: impl Into<String>) -> Self {
        self.route_name = Some(name.into());
        self
    }

    pub fn with_route_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_params.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn route_param(&self, name: &str) -> Option<&str> {
        self.route_params.get(name).map(String::as_str)
    }

    /// Numeric field of the JSON body; numeric strings are accepted.
    pub fn body_id(&self, field: &str) -> Option<ShopId> {
        let value = self.body.as_ref()?.get(field)?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(parse_id))
    }

    /// Client platform from `X-Client-Platform`, web by default.
    pub fn platform(&self) -> Platform {
        Platform::normalize(self.header(PLATFORM_HEADER))
    }

    /// Shop bound by the resolver, if resolution already ran and matched.
    pub fn resolved_shop(&self) -> Option<&Shop> {
        self.shop.get().and_then(Option::as_ref)
    }
}

/// Parse a decimal id; anything else (signs, blanks, letters) is `None`.
pub fn parse_id(raw: &str) -> Option<ShopId> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
