//! Origin criterion: a bare IP address or a CIDR block.

use std::net::IpAddr;

/// Parsed form of a filter's `origin` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginPattern {
    /// Exact address.
    Addr(IpAddr),
    /// Network block; host bits in the address are ignored.
    Cidr {
        /// Network address as written.
        ip: IpAddr,
        /// Prefix length.
        prefix: u8,
    },
}

impl OriginPattern {
    /// Parses `"10.0.0.0/8"`, `"2001:db8::/32"` or a bare address.
    ///
    /// Returns `None` for anything else, including an out-of-range prefix
    /// or surrounding whitespace.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if let Some((addr, prefix)) = text.split_once('/') {
            let ip: IpAddr = addr.parse().ok()?;
            if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let prefix: u8 = prefix.parse().ok()?;
            let max = if ip.is_ipv4() { 32 } else { 128 };
            if prefix > max {
                return None;
            }
            return Some(Self::Cidr { ip, prefix });
        }
        text.parse().ok().map(Self::Addr)
    }

    /// Tests a peer address against the pattern.
    ///
    /// IPv4-mapped IPv6 addresses on either side compare as IPv4; an IPv4
    /// pattern never matches a genuine IPv6 peer and vice versa.
    #[must_use]
    pub fn contains(&self, peer: IpAddr) -> bool {
        let peer = peer.to_canonical();
        match *self {
            Self::Addr(ip) => ip.to_canonical() == peer,
            Self::Cidr { ip, prefix } => match (ip, peer) {
                (IpAddr::V4(net), IpAddr::V4(addr)) => {
                    let mask = if prefix == 0 {
                        0
                    } else {
                        !0u32 << (32 - u32::from(prefix))
                    };
                    (u32::from(net) & mask) == (u32::from(addr) & mask)
                }
                (IpAddr::V6(net), IpAddr::V6(addr)) => {
                    let mask = if prefix == 0 {
                        0
                    } else {
                        !0u128 << (128 - u32::from(prefix))
                    };
                    (u128::from(net) & mask) == (u128::from(addr) & mask)
                }
                (IpAddr::V6(net), IpAddr::V4(addr)) => {
                    // ::ffff:a.b.c.d/len written in IPv6 form
                    let mask = if prefix == 0 {
                        0
                    } else {
                        !0u128 << (128 - u32::from(prefix))
                    };
                    let mapped = u128::from(addr.to_ipv6_mapped());
                    (u128::from(net) & mask) == (mapped & mask)
                }
                (IpAddr::V4(_), IpAddr::V6(_)) => false,
            },
        }
    }
}

/// Convenience wrapper: parse `pattern` and test `peer`. Unparsable patterns
/// never match.
#[must_use]
pub fn origin_matches(pattern: &str, peer: IpAddr) -> bool {
    OriginPattern::parse(pattern).is_some_and(|parsed| parsed.contains(peer))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_cidr_v4() {
        assert!(origin_matches("192.168.100.1/24", ip("192.168.100.77")));
        assert!(!origin_matches("192.168.100.1/24", ip("192.168.101.1")));
        assert!(origin_matches("0.0.0.0/0", ip("8.8.8.8")));
        assert!(origin_matches("10.1.2.3/32", ip("10.1.2.3")));
        assert!(!origin_matches("10.1.2.3/32", ip("10.1.2.4")));
    }

    #[test]
    fn test_cidr_v6() {
        assert!(origin_matches("2001:db8::/48", ip("2001:db8:0:1::1")));
        assert!(!origin_matches("2001:db8::/48", ip("2001:db9::1")));
        assert!(!origin_matches("2001:db8::/48", ip("192.0.2.1")));
    }

    #[test]
    fn test_bare_address() {
        assert!(origin_matches("127.0.0.1", ip("127.0.0.1")));
        assert!(!origin_matches("127.0.0.1", ip("127.0.0.2")));
        assert!(origin_matches("::1", ip("::1")));
    }

    #[test]
    fn test_mapped_peer_compares_as_v4() {
        assert!(origin_matches("192.0.2.0/24", ip("::ffff:192.0.2.9")));
        assert!(origin_matches("192.0.2.9", ip("::ffff:192.0.2.9")));
        assert!(origin_matches("::ffff:192.0.2.9", ip("192.0.2.9")));
        assert!(origin_matches("::ffff:192.0.2.0/120", ip("192.0.2.200")));
    }

    #[test]
    fn test_garbage_never_matches() {
        assert!(!origin_matches("localhost", ip("127.0.0.1")));
        assert!(!origin_matches("10.0.0.0/33", ip("10.0.0.1")));
        assert!(!origin_matches("10.0.0.0/", ip("10.0.0.1")));
        assert!(!origin_matches("10.0.0.0/+8", ip("10.0.0.1")));
        assert!(!origin_matches("", ip("10.0.0.1")));
    }

    #[test]
    fn test_padded_pattern_never_matches() {
        assert!(OriginPattern::parse(" 10.0.0.0/8 ").is_none());
        assert!(!origin_matches(" 10.0.0.0/8 ", ip("10.0.0.1")));
        assert!(!origin_matches("127.0.0.1\n", ip("127.0.0.1")));
        assert!(!origin_matches("10.0.0.0/ 8", ip("10.0.0.1")));
    }
}
