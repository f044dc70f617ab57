//! Address comparison helpers
//!
//! Record contents come back from the record store as strings and may be
//! empty, so equality is defined on parsed addresses rather than text.

use std::net::IpAddr;

/// Parse a textual address, treating empty or malformed input as "no address"
pub fn parse_addr(value: &str) -> Option<IpAddr> {
    value.trim().parse::<IpAddr>().ok()
}

/// Compare two textual addresses
///
/// - Both sides empty or unparsable: equal
/// - One side empty or unparsable: not equal
/// - Both parsed: equal after canonicalisation, so `2001:0db8::1` equals
///   `2001:db8::1` and `::ffff:10.0.0.1` equals `10.0.0.1`
pub fn address_equal(left: &str, right: &str) -> bool {
    addr_opt_equal(parse_addr(left), parse_addr(right))
}

/// Compare two optional typed addresses with the same rules as [`address_equal`]
pub fn addr_opt_equal(left: Option<IpAddr>, right: Option<IpAddr>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => l.to_canonical() == r.to_canonical(),
        _ => false,
    }
}

/// Render an optional address the way logs and errors show it (empty for none)
pub fn display_addr(addr: Option<IpAddr>) -> String {
    addr.map(|ip| ip.to_string()).unwrap_or_default()
}
