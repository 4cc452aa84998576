//! Token decoders for log payload fields.
//!
//! Peers appear either as a bare address (`10.0.0.2`) or as a compound
//! `address:port` / `address:port-STATE` token; only the address part is kept.

use crate::error::{CoreError, CoreResult};
use std::net::Ipv4Addr;

/// Parse a dotted-decimal IPv4 literal
///
/// # Errors
///
/// Returns error for anything that is not an IPv4 literal, including IPv6
pub fn parse_ipv4(raw: &str) -> CoreResult<Ipv4Addr> {
    raw.parse::<Ipv4Addr>()
        .map_err(|_| CoreError::InvalidAddress { raw: raw.to_string() })
}

/// Parse the address part of a host token, discarding any `:port` suffix
///
/// # Errors
///
/// Returns error if the address part is not an IPv4 literal
pub fn host_address(raw: &str) -> CoreResult<Ipv4Addr> {
    let addr = raw.split(':').next().unwrap_or(raw);
    parse_ipv4(addr)
}

/// Split a bracket-delimited list such as `[a,b,c]`
///
/// An empty list (`[]`, `[ ]`) yields no items. Items are trimmed but
/// otherwise kept as-is, including empty ones between two separators.
///
/// # Errors
///
/// Returns error if the token is not enclosed in brackets
pub fn bracketed_list(raw: &str, separator: char) -> CoreResult<Vec<&str>> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| CoreError::MalformedList { raw: raw.to_string() })?
        .trim();

    if inner.is_empty() {
        return Ok(Vec::new());
    }
    Ok(inner.split(separator).map(str::trim).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(parse_ipv4("10.0.0.1").unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert!(parse_ipv4("::1").is_err());
        assert!(parse_ipv4("10.0.0").is_err());
        assert!(parse_ipv4("node-1").is_err());
    }

    #[test]
    fn test_host_address_discards_port() {
        assert_eq!(host_address("10.0.0.2:2900").unwrap(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(
            host_address("10.0.0.2:2900-READY").unwrap(),
            Ipv4Addr::new(10, 0, 0, 2)
        );
        assert_eq!(host_address("10.0.0.2").unwrap(), Ipv4Addr::new(10, 0, 0, 2));
        assert!(host_address(":2900").is_err());
    }

    #[test]
    fn test_bracketed_list() {
        assert_eq!(bracketed_list("[a,b,c]", ',').unwrap(), vec!["a", "b", "c"]);
        assert_eq!(bracketed_list("[ts1:ts2]", ':').unwrap(), vec!["ts1", "ts2"]);
        assert_eq!(bracketed_list("[a,,b]", ',').unwrap(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_bracketed_list_empty() {
        assert!(bracketed_list("[]", ',').unwrap().is_empty());
        assert!(bracketed_list("[ ]", ':').unwrap().is_empty());
    }

    #[test]
    fn test_bracketed_list_requires_brackets() {
        assert!(bracketed_list("a,b", ',').is_err());
        assert!(bracketed_list("[a,b", ',').is_err());
        assert!(bracketed_list("", ',').is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_ipv4_literals_parse(a: u8, b: u8, c: u8, d: u8, port: u16) {
            let addr = Ipv4Addr::new(a, b, c, d);
            proptest::prop_assert_eq!(parse_ipv4(&addr.to_string()).unwrap(), addr);
            proptest::prop_assert_eq!(host_address(&format!("{}:{}", addr, port)).unwrap(), addr);
        }
    }
}
