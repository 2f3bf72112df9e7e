#![no_main]

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use libfuzzer_sys::fuzz_target;
use lwm2m_session::clock::test_support::TestClock;
use lwm2m_session::dtls::connection::{Connection, ConnectionSecurity};
use lwm2m_session::dtls::engine::{DtlsEngine, EngineEvent, PskProvider};
use lwm2m_session::dtls::manager::ConnectionManager;
use lwm2m_session::error::Lwm2mStatus;
use lwm2m_session::ports::SocketHandle;

struct FuzzPsk;
impl PskProvider for FuzzPsk {
    fn psk_for(&self, _is_bootstrap: bool, _server_id: u16) -> Result<(Vec<u8>, Vec<u8>), Lwm2mStatus> {
        Ok((b"id".to_vec(), b"secret".to_vec()))
    }
}

/// Feeds arbitrary bytes through a pass-through engine as if they were
/// decrypted records, exercising the dispatch/rate-limiter path around
/// malformed input without a real DTLS handshake underneath.
#[derive(Default)]
struct PassthroughEngine;

impl DtlsEngine for PassthroughEngine {
    fn handle_packet(&mut self, bytes: &[u8], _psk: &dyn PskProvider) -> Result<EngineEvent, Lwm2mStatus> {
        if bytes.is_empty() {
            return Ok(EngineEvent::HandshakeProgress);
        }
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
        (30, false)
    }
}

fuzz_target!(|data: &[u8]| {
    let mut mgr: ConnectionManager<PassthroughEngine> = ConnectionManager::new(40);
    let clock = TestClock::new(0);
    let sock = SocketHandle(0);
    let peer = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 0, 2, 1), 5684));
    mgr.add_connection(
        Connection::new(
            sock,
            peer,
            ConnectionSecurity {
                is_bootstrap: true,
                server_id: 0,
            },
            0,
        ),
        PassthroughEngine,
    );
    let _ = mgr.dispatch(sock, peer, data, &FuzzPsk, &clock);
});
