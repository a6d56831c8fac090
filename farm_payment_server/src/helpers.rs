use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace, warn};
use regex::Regex;

const FORWARDED_FOR_PATTERN: &str = r#"for="?\[?(?P<ip>[0-9A-Fa-f:.]+)"#;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req.headers().get("Forwarded").and_then(|v| v.to_str().ok()).and_then(forwarded_for);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

/// Applies the processor IP whitelist. With no whitelist configured, every peer is allowed.
pub fn is_peer_allowed(
    req: &HttpRequest,
    whitelist: Option<&[IpAddr]>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
) -> bool {
    let Some(whitelist) = whitelist else {
        return true;
    };
    match get_remote_ip(req, use_x_forwarded_for, use_forwarded) {
        Some(ip) if whitelist.contains(&ip) => {
            trace!("Webhook delivery from whitelisted peer {ip}");
            true
        },
        Some(ip) => {
            warn!("🚨️ Webhook delivery from {ip}, which is not whitelisted. Denying access.");
            false
        },
        None => {
            warn!("🚨️ No IP address found for the webhook peer. Denying access.");
            false
        },
    }
}

fn forwarded_for(header: &str) -> Option<IpAddr> {
    let re = Regex::new(FORWARDED_FOR_PATTERN).ok()?;
    re.captures(header).and_then(|caps| caps.name("ip")).and_then(|m| IpAddr::from_str(m.as_str()).ok())
}
