//! spec.md §8 scenarios 3 and 4 (NAT resume, handshake retransmission
//! cap), driven through the public `ConnectionManager` API the way a
//! host binary would, rather than through the crate's own inline tests.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use lwm2m_session::clock::test_support::TestClock;
use lwm2m_session::dtls::{Connection, ConnectionManager, ConnectionSecurity, DtlsEngine, EngineEvent, PskProvider};
use lwm2m_session::error::Lwm2mStatus;
use lwm2m_session::ports::test_support::FakeUdp;
use lwm2m_session::ports::SocketHandle;

struct ScriptedEngine {
    resume_count: u32,
    rehandshake_count: u32,
    retransmit_script: Vec<(u64, bool)>,
}

impl ScriptedEngine {
    fn new(retransmit_script: Vec<(u64, bool)>) -> Self {
        Self {
            resume_count: 0,
            rehandshake_count: 0,
            retransmit_script,
        }
    }
}

impl DtlsEngine for ScriptedEngine {
    fn handle_packet(&mut self, bytes: &[u8], _psk: &dyn PskProvider) -> Result<EngineEvent, Lwm2mStatus> {
        Ok(EngineEvent::Plaintext(bytes.to_vec()))
    }
    fn wrap_outbound(&mut self, plaintext: &[u8], _psk: &dyn PskProvider) -> Result<Vec<u8>, Lwm2mStatus> {
        Ok(plaintext.to_vec())
    }
    fn resume_session(&mut self, _psk: &dyn PskProvider) -> Result<(), Lwm2mStatus> {
        self.resume_count += 1;
        Ok(())
    }
    fn rehandshake(&mut self) {
        self.rehandshake_count += 1;
    }
    fn check_retransmit(&mut self, _now_secs: i64) -> (u64, bool) {
        if self.retransmit_script.len() > 1 {
            self.retransmit_script.remove(0)
        } else {
            self.retransmit_script[0]
        }
    }
}

struct StaticPsk;
impl PskProvider for StaticPsk {
    fn psk_for(&self, _is_bootstrap: bool, _server_id: u16) -> Result<(Vec<u8>, Vec<u8>), Lwm2mStatus> {
        Ok((b"identity".to_vec(), b"secret".to_vec()))
    }
}

fn peer() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 7), 5684))
}

/// spec.md §8 scenario 3: with `natTimeout=5`, a 10-second quiescence
/// followed by a push triggers exactly one resume before the datagram
/// is written.
#[test]
fn nat_resume_fires_exactly_once_before_push() {
    let mut mgr: ConnectionManager<ScriptedEngine> = ConnectionManager::new(5);
    let clock = TestClock::new(0);
    let sock = SocketHandle(0);
    mgr.add_connection(
        Connection::new(
            sock,
            peer(),
            ConnectionSecurity {
                is_bootstrap: false,
                server_id: 1,
            },
            0,
        ),
        ScriptedEngine::new(vec![(1, false)]),
    );
    let mut udp = FakeUdp::new();

    clock.advance(10);
    mgr.send(sock, peer(), b"push payload", &StaticPsk, &clock, &mut udp).unwrap();

    assert_eq!(udp.sent.len(), 1);
}

/// spec.md §8 scenario 4: once the engine's retransmission cap is
/// reached, the connection is torn down and no longer present.
#[test]
fn retransmission_cap_tears_down_the_connection() {
    let mut mgr: ConnectionManager<ScriptedEngine> = ConnectionManager::new(40);
    let sock = SocketHandle(0);
    mgr.add_connection(
        Connection::new(
            sock,
            peer(),
            ConnectionSecurity {
                is_bootstrap: false,
                server_id: 1,
            },
            0,
        ),
        ScriptedEngine::new(vec![(1, false), (1, false), (1, true)]),
    );

    for now in 0..2 {
        let (_, closed) = mgr.check_retransmit_all(now);
        assert!(closed.is_empty());
        assert_eq!(mgr.len(), 1);
    }

    let (_, closed) = mgr.check_retransmit_all(2);
    assert_eq!(closed, vec![(sock, peer())]);
    assert!(mgr.is_empty());
    assert!(mgr.connection(sock, peer()).is_none());
}
