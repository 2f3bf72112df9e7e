//! Session Manager — §4.5.
//!
//! Orchestrates the whole lifecycle across the other five components: opens
//! the UDP socket, drives bootstrap-then-register, runs the periodic
//! `step` tick, and turns inbound datagrams into CoAP dispatches via the
//! DTLS connection manager.
//!
//! The CoAP protocol state machine itself is an external collaborator
//! (spec.md §1) — `on_bootstrap_complete`/`on_registration_result` are the
//! seam where it reports session-level outcomes back in; this mirrors the
//! teacher's `fsm` module taking event input from `app` and producing
//! state transitions, rather than owning the protocol engine itself.

use std::net::SocketAddr;

use crate::clock::Clock;
use crate::credential_store::{CredentialPskProvider, CredentialStore, Security};
use crate::dtls::{Connection, ConnectionManager, ConnectionSecurity, DispatchOutcome, DtlsEngine, DEFAULT_NAT_TIMEOUT_SECS};
use crate::error::{Lwm2mStatus, PushResult};
use crate::parameter_store::ParameterStore;
use crate::ports::{AddressFamily, CoapPort, SocketHandle, UdpPort};
use crate::session::events::{SessionType, Status, StatusSink};
use crate::session::state::SessionState;

pub struct SessionManager<U, C, E, CL, S>
where
    U: UdpPort,
    C: CoapPort,
    E: DtlsEngine + Default,
    CL: Clock,
    S: StatusSink,
{
    state: SessionState,
    credentials: CredentialStore,
    parameters: ParameterStore,
    connections: ConnectionManager<E>,
    udp: U,
    coap: C,
    clock: CL,
    status: S,
    nat_timeout: i64,
    socket: Option<SocketHandle>,
    active_server: Option<ConnectionSecurity>,
    active_peer: Option<SocketAddr>,
    next_step_at: i64,
    push_in_progress: bool,
    push_callback: Option<Box<dyn FnMut(PushResult) + Send>>,
}

impl<U, C, E, CL, S> SessionManager<U, C, E, CL, S>
where
    U: UdpPort,
    C: CoapPort,
    E: DtlsEngine + Default,
    CL: Clock,
    S: StatusSink,
{
    /// §4.5 `init`: allocates state, installs the status callback, no I/O.
    pub fn init(credentials: CredentialStore, parameters: ParameterStore, udp: U, coap: C, clock: CL, mut status: S) -> Self {
        status.on_status(Status::Initialized);
        Self {
            state: SessionState::Init,
            credentials,
            parameters,
            connections: ConnectionManager::new(DEFAULT_NAT_TIMEOUT_SECS),
            udp,
            coap,
            clock,
            status,
            nat_timeout: DEFAULT_NAT_TIMEOUT_SECS,
            socket: None,
            active_server: None,
            active_peer: None,
            next_step_at: 0,
            push_in_progress: false,
            push_callback: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    /// Mutable access to the credential store, for hosts that need to
    /// push freshly-bootstrapped DM credentials in from outside the
    /// CoAP/bootstrap exchange itself (e.g. a test harness standing in
    /// for the bootstrap server's write).
    pub fn credentials_mut(&mut self) -> &mut CredentialStore {
        &mut self.credentials
    }

    /// The installed status sink, for hosts (and tests) that want to
    /// inspect what it has recorded so far.
    pub fn status(&self) -> &S {
        &self.status
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn has_active_socket(&self) -> bool {
        self.socket.is_some()
    }

    pub fn set_nat_timeout(&mut self, secs: i64) {
        self.nat_timeout = secs;
        self.connections.set_nat_timeout(secs);
    }

    pub fn set_push_callback(&mut self, cb: Box<dyn FnMut(PushResult) + Send>) {
        self.push_callback = Some(cb);
    }

    /// Moves to `next` if [`SessionState::can_transition_to`] allows it from
    /// the current state, rejecting the move otherwise instead of silently
    /// mutating into an undocumented state (spec.md §3).
    fn transition_to(&mut self, next: SessionState) -> Result<(), Lwm2mStatus> {
        if !self.state.can_transition_to(next) {
            return Err(Lwm2mStatus::InvalidState);
        }
        self.state = next;
        Ok(())
    }

    /// §4.5 `connect`: opens a dual-stack socket, starts bootstrap if no DM
    /// credentials are present yet, otherwise goes straight to
    /// registration. Schedules the first `step` at `t = 1s`.
    pub fn connect(&mut self) -> Result<(), Lwm2mStatus> {
        let socket = self.udp.open(AddressFamily::Unspecified)?;
        self.socket = Some(socket);

        let config = self.credentials.config()?;
        if config.dm.is_empty() {
            self.transition_to(SessionState::Bootstrapping)?;
            let bootstrap = config.get_bootstrap().ok_or(Lwm2mStatus::InvalidState)?.clone();
            self.begin_session(SessionType::Bootstrap, &bootstrap)?;
        } else {
            let dm = config.dm.first().cloned().ok_or(Lwm2mStatus::InvalidState)?;
            self.transition_to(SessionState::RegisterRequired)?;
            self.begin_registration(&dm)?;
        }

        self.next_step_at = self.clock.now_secs() + 1;
        Ok(())
    }

    fn begin_session(&mut self, kind: SessionType, security: &Security) -> Result<(), Lwm2mStatus> {
        let uri = crate::credential_store::parse_server_uri(&security.server_uri)?;
        let socket = self.socket.ok_or(Lwm2mStatus::InvalidState)?;

        self.status.on_status(Status::AuthenticationStarted(kind));
        let peer = self.udp.connect(socket, &uri.host, uri.port)?;

        let sec = ConnectionSecurity {
            is_bootstrap: security.is_bootstrap,
            server_id: security.server_id,
        };
        self.connections
            .add_connection(Connection::new(socket, peer, sec, self.clock.now_secs()), E::default());
        self.active_server = Some(sec);
        self.active_peer = Some(peer);

        self.status.on_status(Status::SessionStarted);
        self.status.on_status(Status::Lwm2mSessionTypeStart(kind));
        Ok(())
    }

    fn begin_registration(&mut self, dm: &Security) -> Result<(), Lwm2mStatus> {
        self.transition_to(SessionState::Registering)?;
        self.begin_session(SessionType::Dm, dm)
    }

    /// Reported by the CoAP/bootstrap engine once the bootstrap exchange
    /// concludes.
    pub fn on_bootstrap_complete(&mut self, success: bool) -> Result<(), Lwm2mStatus> {
        if self.state != SessionState::Bootstrapping {
            return Err(Lwm2mStatus::InvalidState);
        }
        if !success {
            self.status.on_status(Status::AuthenticationFailed(SessionType::Bootstrap));
            // Transient failure: retry from Init, per spec.md §3.
            self.transition_to(SessionState::Init)?;
            return Ok(());
        }
        self.transition_to(SessionState::BootstrapDone)?;
        self.transition_to(SessionState::RegisterRequired)?;
        let config = self.credentials.config()?;
        let dm = config.dm.first().cloned().ok_or(Lwm2mStatus::InvalidState)?;
        self.begin_registration(&dm)
    }

    /// Reported by the CoAP engine once a DM registration attempt
    /// concludes. On failure, deletes all DM credentials for `server_id`
    /// to force a fresh bootstrap on the next `connect` (§4.5, §4.7 error
    /// handling).
    pub fn on_registration_result(&mut self, success: bool, server_id: u16) -> Result<(), Lwm2mStatus> {
        if self.state != SessionState::Registering {
            return Err(Lwm2mStatus::InvalidState);
        }
        if success {
            self.transition_to(SessionState::Ready)?;
            self.status.on_status(Status::SessionFinished);
            return Ok(());
        }
        self.status.on_status(Status::AuthenticationFailed(SessionType::Dm));
        self.credentials.delete_dm(server_id)?;
        self.transition_to(SessionState::RegisterRequired)?;
        Ok(())
    }

    /// The periodic tick: drives CoAP retransmission and DTLS handshake
    /// retransmission, and reschedules itself. Returns the number of
    /// seconds until it must be called again.
    pub fn step(&mut self) -> u64 {
        let now = self.clock.now_secs();
        let coap_wait = self.coap.step();
        let (retransmit_wait, closed) = self.connections.check_retransmit_all(now);

        for _ in &closed {
            self.status.on_status(Status::SessionFailed);
            if self.state == SessionState::Bootstrapping {
                let _ = self.transition_to(SessionState::Init);
            }
        }

        let wait = coap_wait.min(retransmit_wait).max(1);
        self.next_step_at = now + wait as i64;
        wait
    }

    pub fn next_step_at(&self) -> i64 {
        self.next_step_at
    }

    /// §4.5 registration update: requires `Ready`, flushes the step timer
    /// to fire promptly.
    pub fn update(&mut self) -> Result<(), Lwm2mStatus> {
        if !self.state.is_ready() {
            return Err(Lwm2mStatus::InvalidState);
        }
        self.transition_to(SessionState::UpdateRequired)?;
        self.next_step_at = self.clock.now_secs() + 1;
        Ok(())
    }

    pub fn update_complete(&mut self, success: bool) -> Result<(), Lwm2mStatus> {
        if self.state != SessionState::UpdateRequired {
            return Err(Lwm2mStatus::InvalidState);
        }
        let next = if success { SessionState::Ready } else { SessionState::RegisterRequired };
        self.transition_to(next)
    }

    /// §4.5 `disconnect`: suspends any in-flight download, stops timers,
    /// frees all connections, closes the socket. Synchronous — on return
    /// no further events or datagrams occur for this session.
    pub fn disconnect(&mut self) -> Result<(), Lwm2mStatus> {
        self.push_in_progress = false;
        self.connections.clear();
        if let Some(socket) = self.socket.take() {
            self.udp.close(socket)?;
        }
        self.active_server = None;
        self.active_peer = None;
        self.transition_to(SessionState::Closed)?;
        self.status.on_status(Status::SessionFinished);
        Ok(())
    }

    pub fn free(&mut self) -> Result<(), Lwm2mStatus> {
        if self.state != SessionState::Closed {
            self.disconnect()?;
        }
        Ok(())
    }

    /// Non-blocking poll of the active socket, for a host loop that wants
    /// to drive [`Self::on_datagram`] itself (spec.md §6 — the receive
    /// callback is wired by the host, not owned by this type). Returns
    /// `Ok(None)` if there is no active socket or nothing is pending.
    pub fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, Lwm2mStatus> {
        let Some(socket) = self.socket else {
            return Ok(None);
        };
        self.udp.try_recv(socket, buf)
    }

    /// Inbound datagram glue: DTLS dispatch → CoAP handler → DTLS-wrapped
    /// response send.
    pub fn on_datagram(&mut self, peer: SocketAddr, bytes: &[u8]) -> Result<(), Lwm2mStatus> {
        let socket = self.socket.ok_or(Lwm2mStatus::InvalidState)?;
        let psk = CredentialPskProvider::new(&self.credentials);

        match self.connections.dispatch(socket, peer, bytes, &psk, &self.clock) {
            DispatchOutcome::Plaintext(plaintext) => {
                if let Some(response) = self.coap.handle_packet(peer, &plaintext)? {
                    self.connections.send(socket, peer, &response, &psk, &self.clock, &mut self.udp)?;
                }
                Ok(())
            }
            DispatchOutcome::NoPlaintext => Ok(()),
            DispatchOutcome::ConnectionClosed => {
                self.status.on_status(Status::SessionFailed);
                if self.state == SessionState::Bootstrapping {
                    let _ = self.transition_to(SessionState::Init);
                }
                Ok(())
            }
        }
    }

    /// §4.5 `push`: best-effort async send of an application-layer
    /// payload over the active DM session.
    pub fn push(&mut self, bytes: &[u8]) -> PushResult {
        if !self.state.is_ready() {
            return PushResult::Failed;
        }
        if self.push_in_progress {
            return PushResult::Busy;
        }
        let (Some(socket), Some(peer)) = (self.socket, self.active_peer) else {
            return PushResult::Failed;
        };

        self.push_in_progress = true;
        let psk = CredentialPskProvider::new(&self.credentials);
        match self.connections.send(socket, peer, bytes, &psk, &self.clock, &mut self.udp) {
            Ok(_) => PushResult::Initiated,
            Err(_) => {
                self.push_in_progress = false;
                PushResult::Failed
            }
        }
    }

    /// Marks a previously `Initiated` push as complete, notifying any
    /// registered push callback.
    pub fn push_complete(&mut self, result: PushResult) {
        self.push_in_progress = false;
        if let Some(cb) = &mut self.push_callback {
            cb(result);
        }
    }

    /// §4.5 `sendAsyncResponse`: reuses the active session's DTLS state,
    /// distinct from `push` only in that the caller supplies a matching
    /// request context (opaque to the session manager).
    pub fn send_async_response(&mut self, _request: &[u8], response: &[u8]) -> Result<(), Lwm2mStatus> {
        let (Some(socket), Some(peer)) = (self.socket, self.active_peer) else {
            return Err(Lwm2mStatus::InvalidState);
        };
        let psk = CredentialPskProvider::new(&self.credentials);
        self.connections.send(socket, peer, response, &psk, &self.clock, &mut self.udp)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::TestClock;
    use crate::credential_store::CredentialId;
    use crate::dtls::engine::{EngineEvent, PskProvider};
    use crate::ports::test_support::FakeUdp;
    use crate::session::events::test_support::RecordingStatusSink;

    #[derive(Default)]
    struct PassthroughEngine;
    impl DtlsEngine for PassthroughEngine {
        fn handle_packet(&mut self, bytes: &[u8], _psk: &dyn PskProvider) -> Result<EngineEvent, Lwm2mStatus> {
            Ok(EngineEvent::Plaintext(bytes.to_vec()))
        }
        fn wrap_outbound(&mut self, plaintext: &[u8], _psk: &dyn PskProvider) -> Result<Vec<u8>, Lwm2mStatus> {
            Ok(plaintext.to_vec())
        }
        fn resume_session(&mut self, _psk: &dyn PskProvider) -> Result<(), Lwm2mStatus> {
            Ok(())
        }
        fn rehandshake(&mut self) {}
        fn check_retransmit(&mut self, _now_secs: i64) -> (u64, bool) {
            (5, false)
        }
    }

    #[derive(Default)]
    struct NullCoap;
    impl CoapPort for NullCoap {
        fn handle_packet(&mut self, _peer: SocketAddr, _bytes: &[u8]) -> Result<Option<Vec<u8>>, Lwm2mStatus> {
            Ok(None)
        }
        fn send(&mut self, _peer: SocketAddr, payload: &[u8]) -> Result<Vec<u8>, Lwm2mStatus> {
            Ok(payload.to_vec())
        }
        fn step(&mut self) -> u64 {
            10
        }
    }

    fn new_manager(
        config_text: &str,
    ) -> (SessionManager<FakeUdp, NullCoap, PassthroughEngine, TestClock, RecordingStatusSink>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clientConfig.txt"), config_text).unwrap();
        let credentials = CredentialStore::open(dir.path().join("clientConfig.txt")).unwrap();
        let parameters = ParameterStore::new(dir.path());
        let manager = SessionManager::init(
            credentials,
            parameters,
            FakeUdp::new(),
            NullCoap,
            TestClock::new(1_000),
            RecordingStatusSink::default(),
        );
        (manager, dir)
    }

    const BOOTSTRAP_ONLY: &str = "[GENERAL]\nENDPOINT = IMEI01\n\n[BOOTSTRAP SECURITY]\nSERVER_URI = coaps://bs.example:5684\nDEVICE_PKID = 6273\nSECRET_KEY = 0102030405060708\n";

    #[test]
    fn cold_bootstrap_then_register_emits_expected_events() {
        let (mut mgr, _dir) = new_manager(BOOTSTRAP_ONLY);
        mgr.connect().unwrap();
        assert_eq!(mgr.state(), SessionState::Bootstrapping);

        mgr.credentials.set(CredentialId::DmAddress, 1, b"coaps://dm.example:5684").unwrap();
        mgr.credentials.set(CredentialId::DmPublicKey, 1, b"dm").unwrap();
        mgr.credentials.set(CredentialId::DmSecretKey, 1, &[1, 2, 3, 4]).unwrap();

        mgr.on_bootstrap_complete(true).unwrap();
        assert_eq!(mgr.state(), SessionState::Registering);

        mgr.on_registration_result(true, 1).unwrap();
        assert_eq!(mgr.state(), SessionState::Ready);

        use Status::*;
        assert_eq!(
            mgr.status.events,
            vec![
                Initialized,
                AuthenticationStarted(SessionType::Bootstrap),
                SessionStarted,
                Lwm2mSessionTypeStart(SessionType::Bootstrap),
                AuthenticationStarted(SessionType::Dm),
                SessionStarted,
                Lwm2mSessionTypeStart(SessionType::Dm),
                SessionFinished,
            ]
        );
    }

    #[test]
    fn registration_failure_clears_dm_credentials() {
        let config = "[GENERAL]\nENDPOINT = IMEI01\n\n[LWM2M SECURITY]\nSERVER_URI 1 = coaps://dm.example:5684\nDEVICE_PKID 1 = 6469\nSECRET_KEY 1 = 00\n";
        let (mut mgr, _dir) = new_manager(config);
        mgr.connect().unwrap();
        assert_eq!(mgr.state(), SessionState::Registering);

        mgr.on_registration_result(false, 1).unwrap();
        assert_eq!(mgr.state(), SessionState::RegisterRequired);
        assert!(!mgr.credentials.check(CredentialId::DmSecretKey, 1));
    }

    #[test]
    fn nat_resume_triggers_exactly_once_on_push() {
        let config = "[GENERAL]\nENDPOINT = IMEI01\n\n[LWM2M SECURITY]\nSERVER_URI 1 = coaps://dm.example:5684\nDEVICE_PKID 1 = 6469\nSECRET_KEY 1 = 00\n";
        let (mut mgr, _dir) = new_manager(config);
        mgr.set_nat_timeout(5);
        mgr.connect().unwrap();
        mgr.on_registration_result(true, 1).unwrap();
        assert_eq!(mgr.state(), SessionState::Ready);

        mgr.clock.advance(10);
        assert_eq!(mgr.push(b"payload"), PushResult::Initiated);
        assert_eq!(mgr.udp.sent.len(), 1);
    }

    #[test]
    fn push_before_ready_is_failed() {
        let (mut mgr, _dir) = new_manager(BOOTSTRAP_ONLY);
        assert_eq!(mgr.push(b"x"), PushResult::Failed);
    }

    #[test]
    fn disconnect_clears_all_state() {
        let config = "[GENERAL]\nENDPOINT = IMEI01\n\n[LWM2M SECURITY]\nSERVER_URI 1 = coaps://dm.example:5684\nDEVICE_PKID 1 = 6469\nSECRET_KEY 1 = 00\n";
        let (mut mgr, _dir) = new_manager(config);
        mgr.connect().unwrap();
        mgr.on_registration_result(true, 1).unwrap();
        mgr.disconnect().unwrap();
        assert_eq!(mgr.state(), SessionState::Closed);
        assert!(mgr.connections.is_empty());
        assert!(mgr.socket.is_none());
    }
}
