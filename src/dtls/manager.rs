//! DTLS Connection Manager — §4.4.
//!
//! Owns every `(socket, peer-addr)` connection, drives the engine
//! underneath each one, and implements the outbound NAT-resume /
//! rehandshake policy and inbound dispatch described in §4.4.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use burster::{Limiter, TokenBucket};

use crate::clock::Clock;
use crate::dtls::connection::Connection;
use crate::dtls::engine::{DtlsEngine, EngineEvent, PskProvider};
use crate::error::Lwm2mStatus;
use crate::ports::{SocketHandle, UdpPort};

/// Default NAT idle timeout (§4.4, §5) — 0 disables resume/rehandshake
/// entirely and outbound sends always proceed directly.
pub const DEFAULT_NAT_TIMEOUT_SECS: i64 = 40;

/// Inbound-datagram rate limit per connection, ahead of the DTLS engine —
/// reuses the teacher's `burster` token-bucket, the same role it plays
/// gating the teacher's RPC auth handshake.
const INBOUND_RATE_CAPACITY: u32 = 20;
const INBOUND_RATE_PER_SEC: u32 = 20;

/// `burster::TokenBucket` is generic over its time provider, expected to be
/// a plain `Fn() -> Duration`; this crate's `Clock` port is a `dyn` trait
/// object supplied per call, not a free function, so the two are bridged
/// through this single process-wide cell rather than one closure per
/// connection. `dispatch` refreshes it from the injected clock before
/// consuming a token.
static INBOUND_RATE_CLOCK_SECS: AtomicI64 = AtomicI64::new(0);

fn inbound_rate_now() -> Duration {
    Duration::from_secs(INBOUND_RATE_CLOCK_SECS.load(Ordering::Relaxed).max(0) as u64)
}

/// Result of feeding one inbound datagram through [`ConnectionManager::dispatch`].
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Plaintext ready for the CoAP handler.
    Plaintext(Vec<u8>),
    /// Handshake record consumed, nothing to deliver yet.
    NoPlaintext,
    /// The connection hit a fatal alert or its retransmission cap and was
    /// torn down; the session manager must surface `SESSION_FAILED`.
    ConnectionClosed,
}

/// One entry per live `(socket, peer)` pair: the connection record plus
/// its dedicated engine instance (§3 "Connection... dtlsSession: option").
struct Entry<E> {
    connection: Connection,
    engine: E,
    inbound_limiter: TokenBucket<fn() -> Duration>,
}

/// Owns the connection list and the NAT-resume/rehandshake policy, per
/// §4.4. Generic over the engine type so tests can supply a fake
/// [`DtlsEngine`] without linking a real record layer.
pub struct ConnectionManager<E> {
    entries: Vec<Entry<E>>,
    nat_timeout: i64,
}

impl<E: DtlsEngine> ConnectionManager<E> {
    pub fn new(nat_timeout: i64) -> Self {
        Self {
            entries: Vec::new(),
            nat_timeout,
        }
    }

    pub fn set_nat_timeout(&mut self, secs: i64) {
        self.nat_timeout = secs;
    }

    pub fn add_connection(&mut self, connection: Connection, engine: E) {
        let inbound_limiter =
            TokenBucket::new_with_time_provider(INBOUND_RATE_CAPACITY, INBOUND_RATE_PER_SEC, inbound_rate_now as fn() -> Duration);
        self.entries.push(Entry {
            connection,
            engine,
            inbound_limiter,
        });
    }

    /// Remove a connection without notifying the peer (plain rehandshake
    /// reset goes through [`Self::rehandshake`] instead).
    pub fn remove(&mut self, socket: SocketHandle, peer: SocketAddr) {
        self.entries.retain(|e| !e.connection.matches(socket, peer));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every connection without notifying peers (§4.5 `disconnect`:
    /// "frees all connections").
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn find_mut(&mut self, socket: SocketHandle, peer: SocketAddr) -> Option<&mut Entry<E>> {
        self.entries.iter_mut().find(|e| e.connection.matches(socket, peer))
    }

    pub fn connection(&self, socket: SocketHandle, peer: SocketAddr) -> Option<&Connection> {
        self.entries.iter().find(|e| e.connection.matches(socket, peer)).map(|e| &e.connection)
    }

    /// Force a fresh handshake on the next record, per §4.4 "Rehandshake".
    /// `IsRehandshake` is only cleared by the next authentication event on
    /// *this* connection (§9 redesign flag — scoped per connection).
    pub fn rehandshake(&mut self, socket: SocketHandle, peer: SocketAddr) {
        if let Some(entry) = self.find_mut(socket, peer) {
            entry.engine.rehandshake();
            entry.connection.is_rehandshake = true;
        }
    }

    /// Outbound send, applying the §4.4 steps 1-4 policy. Only the first
    /// block of a multi-block response should call this; subsequent
    /// blocks of the same response reuse the already-established session.
    pub fn send(
        &mut self,
        socket: SocketHandle,
        peer: SocketAddr,
        plaintext: &[u8],
        psk: &dyn PskProvider,
        clock: &dyn Clock,
        udp: &mut dyn UdpPort,
    ) -> Result<usize, Lwm2mStatus> {
        let now = clock.now_secs();
        let entry = self.find_mut(socket, peer).ok_or(Lwm2mStatus::InvalidState)?;

        let delta_s = now - entry.connection.last_send;
        let delta_r = now - entry.connection.last_received;

        if delta_s < 0 {
            // Wall clock moved backwards.
            entry.engine.rehandshake();
            entry.connection.is_rehandshake = true;
        } else if self.nat_timeout > 0 && delta_s > self.nat_timeout && delta_r > self.nat_timeout {
            if entry.engine.resume_session(psk).is_err() {
                entry.engine.rehandshake();
                entry.connection.is_rehandshake = true;
            }
        }

        let wire = entry.engine.wrap_outbound(plaintext, psk)?;
        let n = udp.send(entry.connection.socket, &wire, entry.connection.peer_addr)?;
        entry.connection.last_send = now;
        Ok(n)
    }

    /// Inbound dispatch: feed `bytes` to the matching connection's engine.
    /// `last_received` updates before the engine sees the datagram, as
    /// §4.4 requires. A `NoRenegotiation` event forces a rehandshake; a
    /// `FatalAlert` tears the connection down.
    pub fn dispatch(
        &mut self,
        socket: SocketHandle,
        peer: SocketAddr,
        bytes: &[u8],
        psk: &dyn PskProvider,
        clock: &dyn Clock,
    ) -> DispatchOutcome {
        let now = clock.now_secs();
        INBOUND_RATE_CLOCK_SECS.store(now, Ordering::Relaxed);
        let Some(entry) = self.find_mut(socket, peer) else {
            // No matching connection: dropped silently with a debug log
            // per §7 "unhandled inbound datagrams... are dropped".
            log::debug!("dropping datagram from unknown peer {peer}");
            return DispatchOutcome::NoPlaintext;
        };
        entry.connection.last_received = now;

        if entry.inbound_limiter.try_consume(1).is_err() {
            log::debug!("rate-limiting inbound datagram from {peer}");
            return DispatchOutcome::NoPlaintext;
        }

        match entry.engine.handle_packet(bytes, psk) {
            Ok(EngineEvent::Plaintext(data)) => DispatchOutcome::Plaintext(data),
            Ok(EngineEvent::HandshakeProgress) => DispatchOutcome::NoPlaintext,
            Ok(EngineEvent::NoRenegotiation) => {
                entry.engine.rehandshake();
                entry.connection.is_rehandshake = true;
                DispatchOutcome::NoPlaintext
            }
            Ok(EngineEvent::FatalAlert) | Err(_) => {
                self.remove(socket, peer);
                DispatchOutcome::ConnectionClosed
            }
        }
    }

    /// Drive retransmission for every connection; returns the minimum
    /// clamped wait across all of them (seconds until `check_retransmit`
    /// must be called again) and the set of peers whose connection was
    /// just torn down for exceeding the retry cap.
    pub fn check_retransmit_all(&mut self, now_secs: i64) -> (u64, Vec<(SocketHandle, SocketAddr)>) {
        let mut min_wait = u64::MAX;
        let mut closed = Vec::new();

        self.entries.retain_mut(|entry| {
            let (deadline, max_reached) = entry.engine.check_retransmit(now_secs);
            if max_reached {
                closed.push((entry.connection.socket, entry.connection.peer_addr));
                return false;
            }
            min_wait = min_wait.min(clamp_wait(deadline));
            true
        });

        let wait = if min_wait == u64::MAX { 1 } else { min_wait };
        (wait, closed)
    }
}

/// §4.4: "clamped to at least one second and floored to '1' when the
/// deadline has already passed".
fn clamp_wait(wait: u64) -> u64 {
    wait.max(1)
}
