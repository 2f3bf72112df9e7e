//! DTLS record-layer engine boundary — §9 redesign flag.
//!
//! The source's `handler` struct was a function-pointer table
//! (`{write, read, event, get_psk_info, ...}`) wired into the engine at
//! construction time. Here that becomes a capability object: a trait the
//! engine consumes, and a trait the connection manager implements for it —
//! ordinary dynamic dispatch through `dyn` objects, no raw pointers.
//!
//! The TLS 1.2-compatible record layer itself (handshake state machine,
//! PSK cipher suites) is assumed to be an available library per spec.md
//! §1 ("the CoAP codec itself... assumed to be an available library"); the
//! same treatment extends to the DTLS engine underneath it. What's
//! implemented here is the *boundary*: the capability-object trait the
//! engine is driven through, and the policy that sits above it in
//! [`crate::dtls::manager::ConnectionManager`].

use crate::error::Lwm2mStatus;

/// PSK lookup capability handed to the engine. Implemented by the
/// connection manager, which resolves `(is_bootstrap, server_id)` against
/// the credential store (§4.4 "the core callback").
pub trait PskProvider: Send {
    /// Returns `(identity, secret)` for the given security record, or an
    /// error if the lookup buffer would overflow the engine's limits.
    fn psk_for(&self, is_bootstrap: bool, server_id: u16) -> Result<(Vec<u8>, Vec<u8>), Lwm2mStatus>;
}

/// Outcome of feeding one inbound datagram to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Decrypted application data, ready for the CoAP handler.
    Plaintext(Vec<u8>),
    /// Handshake record consumed; no plaintext yet, nothing to do.
    HandshakeProgress,
    /// Peer requested renegotiation — not supported; caller must force a
    /// rehandshake (§4.4 "if the engine requires a new handshake").
    NoRenegotiation,
    /// Fatal alert; the connection must be torn down.
    FatalAlert,
}

/// Capability object for a single `(socket, peer)` DTLS connection's
/// record layer. One instance is held per [`crate::dtls::connection::Connection`].
pub trait DtlsEngine: Send {
    /// Feed one inbound datagram, consulting `psk` if a handshake PSK
    /// lookup is needed.
    fn handle_packet(&mut self, bytes: &[u8], psk: &dyn PskProvider) -> Result<EngineEvent, Lwm2mStatus>;

    /// Wrap outbound plaintext into a DTLS record ready for UDP send.
    fn wrap_outbound(&mut self, plaintext: &[u8], psk: &dyn PskProvider) -> Result<Vec<u8>, Lwm2mStatus>;

    /// Attempt a short-path resume using cached session parameters.
    fn resume_session(&mut self, psk: &dyn PskProvider) -> Result<(), Lwm2mStatus>;

    /// Discard the current session state and start a full handshake on
    /// the next outbound/inbound record.
    fn rehandshake(&mut self);

    /// Drive pending handshake retransmissions. Returns
    /// `(next_deadline_secs, max_reached)` — §4.4 "clamped to at least one
    /// second... when the max is reached, the connection is closed".
    fn check_retransmit(&mut self, now_secs: i64) -> (u64, bool);
}
