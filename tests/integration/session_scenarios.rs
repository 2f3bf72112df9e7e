//! End-to-end session-manager scenarios, against the `testing`-feature
//! port fakes — the external counterpart to the inline unit tests in
//! `src/session/manager.rs`, exercising the same public surface a real
//! host binary would use.

use std::net::SocketAddr;

use lwm2m_session::clock::test_support::TestClock;
use lwm2m_session::credential_store::CredentialStore;
use lwm2m_session::dtls::{DtlsEngine, EngineEvent, PskProvider};
use lwm2m_session::error::Lwm2mStatus;
use lwm2m_session::parameter_store::ParameterStore;
use lwm2m_session::ports::test_support::FakeUdp;
use lwm2m_session::ports::CoapPort;
use lwm2m_session::session::events::test_support::RecordingStatusSink;
use lwm2m_session::session::{SessionManager, SessionState, SessionType, Status};

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

#[derive(Default)]
struct RetransmitCapEngine {
    attempts: u32,
}

impl DtlsEngine for RetransmitCapEngine {
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
        self.attempts += 1;
        (1, self.attempts >= 3)
    }
}

type Manager = SessionManager<FakeUdp, NullCoap, PassthroughEngine, TestClock, RecordingStatusSink>;
type ManagerRetransmitCap = SessionManager<FakeUdp, NullCoap, RetransmitCapEngine, TestClock, RecordingStatusSink>;

fn new_manager(config_text: &str) -> (Manager, tempfile::TempDir) {
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

/// spec.md §8 scenario 1: cold bootstrap → register emits the full
/// ordered event stream.
#[test]
fn cold_bootstrap_to_register_scenario() {
    let (mut mgr, _dir) = new_manager(BOOTSTRAP_ONLY);
    mgr.connect().unwrap();

    mgr.credentials_mut()
        .set(lwm2m_session::credential_store::CredentialId::DmAddress, 1, b"coaps://dm.example:5684")
        .unwrap();
    mgr.credentials_mut()
        .set(lwm2m_session::credential_store::CredentialId::DmPublicKey, 1, b"dm")
        .unwrap();
    mgr.credentials_mut()
        .set(lwm2m_session::credential_store::CredentialId::DmSecretKey, 1, &[1, 2, 3, 4])
        .unwrap();

    mgr.on_bootstrap_complete(true).unwrap();
    mgr.on_registration_result(true, 1).unwrap();

    assert_eq!(mgr.state(), SessionState::Ready);
    assert_eq!(
        &mgr.status().events,
        &vec![
            Status::Initialized,
            Status::AuthenticationStarted(SessionType::Bootstrap),
            Status::SessionStarted,
            Status::Lwm2mSessionTypeStart(SessionType::Bootstrap),
            Status::AuthenticationStarted(SessionType::Dm),
            Status::SessionStarted,
            Status::Lwm2mSessionTypeStart(SessionType::Dm),
            Status::SessionFinished,
        ]
    );
}

/// spec.md §8 round-trip/idempotence: `connect` then `disconnect`
/// restores the initial resource state — no sockets, no connections.
#[test]
fn connect_then_disconnect_restores_initial_state() {
    let config = "[GENERAL]\nENDPOINT = IMEI01\n\n[LWM2M SECURITY]\nSERVER_URI 1 = coaps://dm.example:5684\nDEVICE_PKID 1 = 6469\nSECRET_KEY 1 = 00\n";
    let (mut mgr, _dir) = new_manager(config);

    mgr.connect().unwrap();
    mgr.on_registration_result(true, 1).unwrap();
    assert_eq!(mgr.state(), SessionState::Ready);

    mgr.disconnect().unwrap();

    assert_eq!(mgr.state(), SessionState::Closed);
    assert!(mgr.connection_count() == 0);
    assert!(!mgr.has_active_socket());
}

/// spec.md §8 scenario 4: blocked UDP egress exhausts the engine's
/// retransmit cap, `step` tears down the connection and emits
/// `SessionFailed`.
#[test]
fn step_tears_down_connection_and_emits_session_failed_after_retransmit_cap() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("clientConfig.txt"), BOOTSTRAP_ONLY).unwrap();
    let credentials = CredentialStore::open(dir.path().join("clientConfig.txt")).unwrap();
    let parameters = ParameterStore::new(dir.path());
    let mut mgr: ManagerRetransmitCap = SessionManager::init(
        credentials,
        parameters,
        FakeUdp::new(),
        NullCoap,
        TestClock::new(0),
        RecordingStatusSink::default(),
    );
    mgr.connect().unwrap();
    assert_eq!(mgr.state(), SessionState::Bootstrapping);

    for _ in 0..3 {
        mgr.step();
    }

    assert!(mgr.status().events.contains(&Status::SessionFailed));
    assert_eq!(mgr.connection_count(), 0);
    assert_eq!(mgr.state(), SessionState::Init);
}
