//! Client address resolution for requests behind (or without) a reverse proxy.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use splus_domain::constants::LOCALHOST_ADDRESSES;
use std::net::SocketAddr;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// First non-empty entry of `X-Forwarded-For`, if any.
#[must_use]
pub fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

/// Peer address recorded by `into_make_service_with_connect_info`.
#[must_use]
pub fn peer_addr<B>(request: &Request<B>) -> Option<SocketAddr> {
    request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0)
}

/// Client IP: the forwarded address wins over the socket peer.
#[must_use]
pub fn client_ip<B>(request: &Request<B>) -> Option<String> {
    forwarded_for(request.headers())
        .map(str::to_owned)
        .or_else(|| peer_addr(request).map(|addr| addr.ip().to_string()))
}

#[must_use]
pub fn is_localhost(ip: &str) -> bool {
    LOCALHOST_ADDRESSES.contains(&ip)
}
