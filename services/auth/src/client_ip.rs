//! Client address resolution behind proxies

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Placeholder used when no address can be determined
pub const UNKNOWN_ADDRESS: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Resolve the client address of a request
///
/// Order: leftmost `X-Forwarded-For` entry, `X-Real-IP`, the socket peer,
/// then [`UNKNOWN_ADDRESS`].
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = header_value(headers, FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    if let Some(ip) = header_value(headers, REAL_IP).map(str::trim).filter(|v| !v.is_empty()) {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

/// Whether an address is loopback or private
pub fn is_local_ip(ip: &str) -> bool {
    if ip == "localhost" {
        return true;
    }

    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_loopback() || v4.is_private(),
        // fc00::/7 covers both fc00: and fd00: unique local ranges
        Ok(IpAddr::V6(v6)) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
        Err(_) => false,
    }
}

/// Whether an address is a real observation rather than the placeholder
pub fn is_known_address(ip: &str) -> bool {
    !ip.is_empty() && ip != UNKNOWN_ADDRESS
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Extractor for the resolved client address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(resolve_client_ip(&parts.headers, peer)))
    }
}
