//! Callback access gates.
//!
//! Gateways call back from fixed address ranges and some deployments put
//! Basic auth in front of the callback endpoint. Both gates are optional and
//! driven by [`ProviderConfig`]; the HTTP layer turns their errors into
//! `403`/`401` answers.

use std::net::IpAddr;

use crate::config::{ALLOWED_IPS, HTTP_AUTH_PASS, HTTP_AUTH_USER, ProviderConfig, SHOP_NAME};
use crate::error::AccessError;
use crate::request::BasicCredentials;

/// Realm announced when no `shop_name` is configured.
pub const DEFAULT_REALM: &str = "Online Shop";

/// Checks `ip` against the comma-separated `allowed_ips` list.
///
/// Entries are single addresses or CIDR ranges, IPv4 or IPv6. Without an
/// `allowed_ips` option every client passes. Unparseable entries never match.
///
/// # Errors
///
/// Returns [`AccessError::IpNotAllowed`] if a list is configured and no entry
/// matches.
pub fn check_ip_allowed(config: &ProviderConfig, ip: IpAddr) -> Result<(), AccessError> {
    let Some(list) = config.get(ALLOWED_IPS).filter(|l| !l.trim().is_empty()) else {
        return Ok(());
    };
    if list.split(',').any(|entry| matches_entry(entry.trim(), ip)) {
        return Ok(());
    }

    #[cfg(feature = "telemetry")]
    tracing::warn!(%ip, "IP not allowed");

    Err(AccessError::IpNotAllowed(ip))
}

/// Checks Basic credentials against `http_auth_user`/`http_auth_pass`.
///
/// # Errors
///
/// Returns [`AccessError::Unauthorized`] if no credentials were presented or
/// they differ from the configured pair.
pub fn check_http_auth(
    config: &ProviderConfig,
    credentials: Option<&BasicCredentials>,
) -> Result<(), AccessError> {
    let Some(credentials) = credentials else {
        #[cfg(feature = "telemetry")]
        tracing::warn!("HTTP authorization cancelled");
        return Err(AccessError::Unauthorized);
    };

    let user_ok = config.get(HTTP_AUTH_USER) == Some(credentials.user.as_str());
    let pass_ok = config.get(HTTP_AUTH_PASS) == Some(credentials.password.as_str());
    if user_ok && pass_ok {
        return Ok(());
    }

    #[cfg(feature = "telemetry")]
    tracing::warn!(user = %credentials.user, "HTTP authorization error: wrong username or password");

    Err(AccessError::Unauthorized)
}

/// Realm for the `WWW-Authenticate` challenge.
#[must_use]
pub fn realm(config: &ProviderConfig) -> &str {
    config.get_or(SHOP_NAME, DEFAULT_REALM)
}

fn matches_entry(entry: &str, ip: IpAddr) -> bool {
    let (addr, prefix) = match entry.split_once('/') {
        Some((addr, prefix)) => match prefix.parse::<u32>() {
            Ok(prefix) => (addr, Some(prefix)),
            Err(_) => return false,
        },
        None => (entry, None),
    };
    let Ok(network) = addr.parse::<IpAddr>() else {
        return false;
    };

    match (network, ip) {
        (IpAddr::V4(net), IpAddr::V4(ip)) => {
            prefix_matches(u32::from(net).into(), u32::from(ip).into(), prefix.unwrap_or(32), 32)
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) => {
            prefix_matches(u128::from(net), u128::from(ip), prefix.unwrap_or(128), 128)
        }
        _ => false,
    }
}

fn prefix_matches(network: u128, ip: u128, prefix: u32, bits: u32) -> bool {
    if prefix > bits {
        return false;
    }
    if prefix == 0 {
        return true;
    }
    let shift = bits - prefix;
    (network >> shift) == (ip >> shift)
}
