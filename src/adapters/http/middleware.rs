use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Resolve the client IP for audit trails. Forwarded headers are only
/// trusted when the API is explicitly configured behind a reverse proxy.
pub fn client_ip(trust_proxy: bool, headers: &HeaderMap, addr: SocketAddr) -> String {
    if trust_proxy {
        forwarded_ip(headers).unwrap_or_else(|| addr.ip().to_string())
    } else {
        addr.ip().to_string()
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    // Extract IP from X-Forwarded-For or X-Real-IP headers
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let trimmed = first.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    if let Some(real) = headers.get("x-real-ip")
        && let Ok(val) = real.to_str()
        && !val.trim().is_empty()
    {
        return Some(val.trim().to_string());
    }
    None
}
