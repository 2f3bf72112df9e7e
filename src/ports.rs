//! External-interface port traits — §6.
//!
//! These are the hexagonal boundary between this crate's domain logic (the
//! DTLS connection manager and session manager) and the outside world,
//! following the same pattern as the teacher's `app::ports` module: driven
//! adapters implement the trait, the domain core consumes it via generics
//! or a trait object, and never touches the concrete transport directly.

use std::net::SocketAddr;

use crate::error::Lwm2mStatus;

/// Socket address family requested when opening a UDP socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
    /// Dual-stack (spec.md §4.5 "configured for both v4 and v6").
    Unspecified,
}

/// Handle to an opened UDP socket, returned by [`UdpPort::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle(pub u32);

/// UDP socket surface (§6). Implemented by the host's OS-socket adapter;
/// the domain core never calls `std::net::UdpSocket` directly.
pub trait UdpPort: Send {
    /// Open a socket bound for the given address family. The host's I/O
    /// loop is responsible for invoking the receive callback per spec.md
    /// §6 — this trait only models the synchronous send/connect/close
    /// surface the connection manager drives directly.
    fn open(&mut self, af: AddressFamily) -> Result<SocketHandle, Lwm2mStatus>;

    fn close(&mut self, sock: SocketHandle) -> Result<(), Lwm2mStatus>;

    /// Resolve `host:port` and connect a socket to it, returning the
    /// resolved peer address.
    fn connect(&mut self, sock: SocketHandle, host: &str, port: u16) -> Result<SocketAddr, Lwm2mStatus>;

    /// Send `buf` to `peer` over `sock`. Returns the number of bytes sent.
    fn send(&mut self, sock: SocketHandle, buf: &[u8], peer: SocketAddr) -> Result<usize, Lwm2mStatus>;

    /// Non-blocking receive. `Ok(None)` means no datagram is currently
    /// available (the outer `select`-style wait, per spec.md §5, is the
    /// only legal blocking point and lives above this trait).
    fn try_recv(&mut self, sock: SocketHandle, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, Lwm2mStatus>;
}

/// CoAP codec boundary (§6, out of scope per spec.md §1 — "assumed to be
/// an available library with a `handle_packet`/`send` surface").
pub trait CoapPort: Send {
    /// Feed a decrypted datagram from `peer` into the CoAP state machine.
    /// Returns any response bytes that should be sent back immediately.
    fn handle_packet(&mut self, peer: SocketAddr, bytes: &[u8]) -> Result<Option<Vec<u8>>, Lwm2mStatus>;

    /// Serialize an outbound CoAP message (e.g. a push or async response)
    /// ready to be handed to the DTLS layer for encryption and send.
    fn send(&mut self, peer: SocketAddr, payload: &[u8]) -> Result<Vec<u8>, Lwm2mStatus>;

    /// Drive pending CoAP retransmissions; returns the number of seconds
    /// until the next call is needed, mirroring
    /// [`crate::dtls::manager::ConnectionManager::check_retransmit`].
    fn step(&mut self) -> u64;
}

#[cfg(any(test, feature = "testing"))]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::collections::VecDeque;
    use std::net::{Ipv4Addr, SocketAddrV4};

    /// In-memory `UdpPort` used by session-manager integration tests — a
    /// pair of queues per socket, not a real kernel socket, analogous to
    /// the teacher's `rpc::transport::NullTransport` test double.
    #[derive(Default)]
    pub struct FakeUdp {
        next_handle: u32,
        inboxes: HashMap<u32, VecDeque<(Vec<u8>, SocketAddr)>>,
        pub sent: Vec<(SocketHandle, Vec<u8>, SocketAddr)>,
        pub drop_sends: bool,
    }

    impl FakeUdp {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn deliver(&mut self, sock: SocketHandle, from: SocketAddr, bytes: Vec<u8>) {
            self.inboxes.entry(sock.0).or_default().push_back((bytes, from));
        }

        fn addr(port: u16) -> SocketAddr {
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
        }
    }

    impl UdpPort for FakeUdp {
        fn open(&mut self, _af: AddressFamily) -> Result<SocketHandle, Lwm2mStatus> {
            let h = self.next_handle;
            self.next_handle += 1;
            self.inboxes.insert(h, VecDeque::new());
            Ok(SocketHandle(h))
        }

        fn close(&mut self, sock: SocketHandle) -> Result<(), Lwm2mStatus> {
            self.inboxes.remove(&sock.0);
            Ok(())
        }

        fn connect(&mut self, _sock: SocketHandle, host: &str, port: u16) -> Result<SocketAddr, Lwm2mStatus> {
            if host.is_empty() {
                return Err(Lwm2mStatus::ConnectError);
            }
            Ok(Self::addr(port))
        }

        fn send(&mut self, sock: SocketHandle, buf: &[u8], peer: SocketAddr) -> Result<usize, Lwm2mStatus> {
            if self.drop_sends {
                return Err(Lwm2mStatus::SendError);
            }
            self.sent.push((sock, buf.to_vec(), peer));
            Ok(buf.len())
        }

        fn try_recv(&mut self, sock: SocketHandle, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, Lwm2mStatus> {
            let Some(inbox) = self.inboxes.get_mut(&sock.0) else {
                return Ok(None);
            };
            let Some((bytes, from)) = inbox.pop_front() else {
                return Ok(None);
            };
            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            Ok(Some((n, from)))
        }
    }
}
