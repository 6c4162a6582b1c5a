//! Inbound message envelope.

use bytes::Bytes;
use std::net::{IpAddr, SocketAddr};

/// One message as handed over by the inbound listener.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Address of the client that submitted the message.
    pub peer: SocketAddr,
    /// Reverse-path; empty for the null sender.
    pub sender: String,
    /// Forward-paths in the order they were given.
    pub recipients: Vec<String>,
    /// Raw message bytes, dot-unstuffed, headers included.
    pub data: Bytes,
}

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub fn new(
        peer: SocketAddr,
        sender: impl Into<String>,
        recipients: Vec<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            peer,
            sender: sender.into(),
            recipients,
            data: data.into(),
        }
    }

    /// Peer IP with IPv4-mapped IPv6 addresses folded to IPv4.
    #[must_use]
    pub fn origin(&self) -> IpAddr {
        self.peer.ip().to_canonical()
    }

    /// Message size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_folds_mapped_ipv4() {
        let env = Envelope::new(
            "[::ffff:192.0.2.7]:2525".parse().unwrap(),
            "a@example.com",
            vec![],
            &b"x"[..],
        );
        assert_eq!(env.origin(), "192.0.2.7".parse::<IpAddr>().unwrap());
        assert_eq!(env.size(), 1);
    }
}
