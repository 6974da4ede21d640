//! Where the carrier should send the next input webhook.

use std::net::IpAddr;

use axum::http::header::HOST;
use axum::http::HeaderMap;
use parley_engine::CallbackBase;

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";

/// Derive `{scheme}://{host}` from request headers, honoring reverse-proxy
/// headers. Public hosts always get `https`; the carrier refuses plain
/// HTTP callbacks.
pub fn callback_base(headers: &HeaderMap) -> CallbackBase {
    let host = first_value(headers, FORWARDED_HOST)
        .or_else(|| first_value(headers, HOST.as_str()))
        .unwrap_or("localhost");
    let scheme = match first_value(headers, FORWARDED_PROTO) {
        _ if !is_loopback(host) => "https",
        Some(proto) => proto,
        None => "http",
    };
    CallbackBase::new(format!("{scheme}://{host}"))
}

fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `localhost`, `127.0.0.0/8` or `::1`, with or without a port.
fn is_loopback(host: &str) -> bool {
    let name = if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or(rest)
    } else if host.matches(':').count() == 1 {
        host.split(':').next().unwrap_or(host)
    } else {
        host
    };
    name.eq_ignore_ascii_case("localhost")
        || name.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}
