//! `Connection` record and address-equality comparator — §3, §4.4.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::ports::SocketHandle;

/// Which security record (§4.1 `CredentialId`) a connection's PSK lookups
/// resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSecurity {
    pub is_bootstrap: bool,
    /// Ignored when `is_bootstrap` is true (§3 "for bootstrap variants,
    /// serverId is ignored").
    pub server_id: u16,
}

/// One `(socket, peer-addr)` pair, per §3's `Connection` data model.
///
/// `dtls_session = None` means the connection is plaintext — forbidden for
/// any peer whose security record declares a mode other than "none"; the
/// connection manager never constructs one for a PSK-secured peer.
pub struct Connection {
    pub socket: SocketHandle,
    pub peer_addr: SocketAddr,
    pub security: ConnectionSecurity,
    pub has_dtls_session: bool,
    /// Seconds since epoch of the last successful outbound datagram.
    pub last_send: i64,
    /// Seconds since epoch of the last inbound datagram, pre-dispatch.
    pub last_received: i64,
    /// Scoped per-connection per the §9 redesign flag — cleared only after
    /// the next authentication event for *this* connection, never a module
    /// global.
    pub is_rehandshake: bool,
}

impl Connection {
    pub fn new(socket: SocketHandle, peer_addr: SocketAddr, security: ConnectionSecurity, created_at: i64) -> Self {
        Self {
            socket,
            peer_addr,
            security,
            has_dtls_session: false,
            last_send: created_at,
            last_received: created_at,
            is_rehandshake: false,
        }
    }

    /// Whether this record matches an inbound/outbound `(socket, peer)`
    /// pair, using the IPv4/IPv4-mapped-IPv6 equivalence of §4.4.
    pub fn matches(&self, socket: SocketHandle, peer: SocketAddr) -> bool {
        self.socket == socket && addr_eq(self.peer_addr, peer)
    }
}

/// §4.4 address comparator: equal port, and either both IPv4 with equal
/// bytes, both IPv6 with equal bytes, or one IPv4 and the other its
/// IPv4-mapped IPv6 equivalent.
pub fn addr_eq(a: SocketAddr, b: SocketAddr) -> bool {
    if a.port() != b.port() {
        return false;
    }
    match (normalize(a.ip()), normalize(b.ip())) {
        (NormalizedIp::V4(x), NormalizedIp::V4(y)) => x == y,
        (NormalizedIp::V6(x), NormalizedIp::V6(y)) => x == y,
        _ => false,
    }
}

enum NormalizedIp {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

/// Collapses an IPv4-mapped IPv6 address down to its embedded IPv4 form so
/// the comparator only has one IPv4 representation to compare.
fn normalize(ip: IpAddr) -> NormalizedIp {
    match ip {
        IpAddr::V4(v4) => NormalizedIp::V4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => NormalizedIp::V4(v4),
            None => NormalizedIp::V6(v6),
        },
    }
}
