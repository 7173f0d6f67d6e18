//! Outbound target validation and credential redaction for HTTP nodes.
//!
//! `validate_target` runs before any request is dispatched and rejects
//! URLs that point at loopback, private, link-local, or cloud metadata
//! addresses. The same `is_blocked_ip` check is applied by the transport to
//! DNS-resolved addresses and redirect targets, so hostnames that resolve
//! into blocked ranges are stopped as well.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

/// Replacement for sensitive header values in logs.
pub const REDACTED: &str = "[REDACTED]";

/// Header names whose values never appear in logs.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "api-key",
    "x-api-key",
    "cookie",
    "set-cookie",
];

/// Hostnames that resolve to local or metadata services.
const BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "metadata",
    "metadata.google.internal",
    "instance-data",
];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Reasons an outbound target is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme '{0}' (only http and https are allowed)")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("target address {0} is in a blocked range")]
    BlockedAddress(IpAddr),

    #[error("target host '{0}' is blocked")]
    BlockedHost(String),
}

// ---------------------------------------------------------------------------
// Address checks
// ---------------------------------------------------------------------------

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_multicast()
        // 0.0.0.0/8 "this network"
        || a == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64)
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4 reserved, including broadcast
        || a >= 240
}

/// The IPv4 address carried inside an IPv6 address, if any.
///
/// Covers IPv4-mapped and IPv4-compatible forms, NAT64 (`64:ff9b::/96`)
/// and 6to4 (`2002::/16`).
fn embedded_ipv4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    let seg = ip.segments();
    let from_pair = |hi: u16, lo: u16| {
        let [a, b] = hi.to_be_bytes();
        let [c, d] = lo.to_be_bytes();
        Ipv4Addr::new(a, b, c, d)
    };
    match seg {
        [0x0064, 0xff9b, 0, 0, 0, 0, hi, lo] => Some(from_pair(hi, lo)),
        [0x2002, hi, lo, ..] => Some(from_pair(hi, lo)),
        _ => ip.to_ipv4(),
    }
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = embedded_ipv4(ip) {
        return is_blocked_ipv4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

/// Whether requests to `ip` must be refused.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

/// Whether a hostname names a local or metadata service.
pub fn is_blocked_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    BLOCKED_HOSTS.contains(&host.as_str()) || host.ends_with(".localhost")
}

/// Parse and validate an outbound URL.
///
/// With `allow_private` set only the scheme and host presence are checked.
pub fn validate_target(raw: &str, allow_private: bool) -> Result<Url, GuardError> {
    let url = Url::parse(raw).map_err(|e| GuardError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(GuardError::UnsupportedScheme(other.to_string())),
    }

    let host = url.host().ok_or(GuardError::MissingHost)?;
    if allow_private {
        return Ok(url);
    }

    match host {
        Host::Ipv4(ip) if is_blocked_ipv4(ip) => Err(GuardError::BlockedAddress(IpAddr::V4(ip))),
        Host::Ipv6(ip) if is_blocked_ipv6(ip) => Err(GuardError::BlockedAddress(IpAddr::V6(ip))),
        Host::Domain(name) if is_blocked_host(name) => {
            Err(GuardError::BlockedHost(name.to_string()))
        }
        _ => Ok(url),
    }
}

// ---------------------------------------------------------------------------
// Redaction
// ---------------------------------------------------------------------------

/// Copy of `url` without userinfo, for logging.
///
/// reqwest turns `user:pass@` into an `Authorization` header, so the
/// credentials are treated like one.
pub fn redact_url(url: &Url) -> Url {
    let mut clean = url.clone();
    if !clean.username().is_empty() || clean.password().is_some() {
        // Only fails for cannot-be-a-base URLs, which carry no userinfo.
        let _ = clean.set_password(None);
        let _ = clean.set_username("");
    }
    clean
}

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Copy of `headers` with credential-bearing values replaced.
pub fn redact_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                REDACTED.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
