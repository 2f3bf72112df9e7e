//! LwM2M session daemon — interactive entry point.
//!
//! Wires the library's hexagonal core (credential/parameter store, DTLS
//! connection manager, session manager) to concrete host adapters: a
//! real `UdpSocket`-backed [`ports::UdpPort`], and placeholder
//! [`ports::CoapPort`]/[`dtls::DtlsEngine`] implementations standing in
//! for the external CoAP codec and DTLS record layer (spec.md §1 treats
//! both as available libraries this crate consumes, not builds).
//!
//! The interactive surface is a persistent `start`/`stop`/`update`/`quit`
//! read loop over stdin (spec.md §6), not a `clap` subcommand parser —
//! `clap` here only parses the one-shot `-d` startup flag.
#![deny(unused_must_use)]

use std::io::{BufRead, Write as _};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use lwm2m_session::clock::SystemClock;
use lwm2m_session::config::RuntimeConfig;
use lwm2m_session::credential_store::CredentialStore;
use lwm2m_session::dtls::engine::{DtlsEngine, EngineEvent, PskProvider};
use lwm2m_session::error::Lwm2mStatus;
use lwm2m_session::parameter_store::ParameterStore;
use lwm2m_session::ports::{AddressFamily, CoapPort, SocketHandle, UdpPort};
use lwm2m_session::session::{NullStatusSink, SessionManager};

/// OMA LwM2M client session daemon.
#[derive(Parser, Debug)]
#[command(name = "lwm2m-client", version, about)]
struct Cli {
    /// Path to the credential store file (§4.1).
    #[arg(long, default_value = "clientConfig.txt")]
    config: String,

    /// Directory holding the parameter-store primary/backup files (§4.2).
    #[arg(long, default_value = ".")]
    parameter_dir: String,

    /// Raise the DTLS/session logger to debug.
    #[arg(short, long)]
    debug: bool,
}

/// `UdpPort` backed by a real non-blocking `std::net::UdpSocket` per
/// `SocketHandle`, mirroring the teacher's `rpc::transport` adapter shape:
/// the domain core only ever sees the trait, never this struct.
#[derive(Default)]
struct StdUdpPort {
    sockets: Vec<Option<UdpSocket>>,
}

impl UdpPort for StdUdpPort {
    fn open(&mut self, af: AddressFamily) -> Result<SocketHandle, Lwm2mStatus> {
        let bind_addr = match af {
            AddressFamily::V4 => "0.0.0.0:0",
            AddressFamily::V6 | AddressFamily::Unspecified => "[::]:0",
        };
        let socket = UdpSocket::bind(bind_addr).map_err(|_| Lwm2mStatus::ConnectError)?;
        socket.set_nonblocking(true).map_err(|_| Lwm2mStatus::ConnectError)?;
        let handle = SocketHandle(self.sockets.len() as u32);
        self.sockets.push(Some(socket));
        Ok(handle)
    }

    fn close(&mut self, sock: SocketHandle) -> Result<(), Lwm2mStatus> {
        let slot = self.sockets.get_mut(sock.0 as usize).ok_or(Lwm2mStatus::InvalidArg)?;
        *slot = None;
        Ok(())
    }

    fn connect(&mut self, sock: SocketHandle, host: &str, port: u16) -> Result<SocketAddr, Lwm2mStatus> {
        let socket = self.socket(sock)?;
        socket.connect((host, port)).map_err(|_| Lwm2mStatus::ConnectError)?;
        socket.peer_addr().map_err(|_| Lwm2mStatus::ConnectError)
    }

    fn send(&mut self, sock: SocketHandle, buf: &[u8], peer: SocketAddr) -> Result<usize, Lwm2mStatus> {
        let socket = self.socket(sock)?;
        socket.send_to(buf, peer).map_err(|_| Lwm2mStatus::SendError)
    }

    fn try_recv(&mut self, sock: SocketHandle, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, Lwm2mStatus> {
        let socket = self.socket(sock)?;
        match socket.recv_from(buf) {
            Ok((n, from)) => Ok(Some((n, from))),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(_) => Ok(None),
        }
    }
}

impl StdUdpPort {
    fn socket(&mut self, sock: SocketHandle) -> Result<&UdpSocket, Lwm2mStatus> {
        self.sockets
            .get(sock.0 as usize)
            .and_then(|s| s.as_ref())
            .ok_or(Lwm2mStatus::InvalidArg)
    }
}

/// Placeholder `CoapPort`: the CoAP codec is an external collaborator
/// per spec.md §1. This stub acknowledges nothing and never retransmits,
/// leaving the seam where a real CoAP engine plugs in.
#[derive(Default)]
struct PlaceholderCoap;

impl CoapPort for PlaceholderCoap {
    fn handle_packet(&mut self, peer: SocketAddr, bytes: &[u8]) -> Result<Option<Vec<u8>>, Lwm2mStatus> {
        debug!("coap: {} bytes from {peer} (no codec wired)", bytes.len());
        Ok(None)
    }

    fn send(&mut self, _peer: SocketAddr, payload: &[u8]) -> Result<Vec<u8>, Lwm2mStatus> {
        Ok(payload.to_vec())
    }

    fn step(&mut self) -> u64 {
        10
    }
}

/// Placeholder `DtlsEngine`: the record-layer handshake itself is an
/// external collaborator (same treatment as the CoAP codec — see
/// `dtls::engine`'s module doc). Passes bytes through as plaintext so the
/// connection-manager policy above it (NAT resume, rehandshake,
/// retransmission) can be exercised end to end without a real handshake.
#[derive(Default)]
struct PassthroughDtlsEngine;

impl DtlsEngine for PassthroughDtlsEngine {
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
        (30, false)
    }
}

type Manager = SessionManager<StdUdpPort, PlaceholderCoap, PassthroughDtlsEngine, SystemClock, NullStatusSink>;

fn print_prompt() {
    print!("lwm2m> ");
    let _ = std::io::stdout().flush();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.debug {
        builder.filter_module("lwm2m_session", log::LevelFilter::Debug);
    }
    builder.init();

    let runtime = RuntimeConfig {
        credential_store_path: cli.config.clone(),
        parameter_store_dir: cli.parameter_dir.clone(),
        ..RuntimeConfig::default()
    };

    let credentials = CredentialStore::open(&runtime.credential_store_path)
        .with_context(|| format!("opening credential store at {}", runtime.credential_store_path))?;
    let parameters = ParameterStore::new(&runtime.parameter_store_dir);

    let mut manager: Manager = SessionManager::init(
        credentials,
        parameters,
        StdUdpPort::default(),
        PlaceholderCoap,
        SystemClock,
        NullStatusSink,
    );
    manager.set_nat_timeout(runtime.nat_timeout_secs);

    info!("ready — type 'start', 'update', 'stop', or 'quit'");
    print_prompt();

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        match line.trim() {
            "start" => match manager.connect() {
                Ok(()) => info!("session started, state = {:?}", manager.state()),
                Err(e) => warn!("start failed: {e}"),
            },
            "update" => match manager.update() {
                Ok(()) => info!("update requested, state = {:?}", manager.state()),
                Err(e) => warn!("update failed: {e}"),
            },
            "stop" => match manager.disconnect() {
                Ok(()) => info!("session stopped"),
                Err(e) => warn!("stop failed: {e}"),
            },
            "quit" => {
                let _ = manager.free();
                break;
            }
            "" => {}
            other => warn!("unrecognised command: {other:?}"),
        }
        poll_once(&mut manager);
        print_prompt();
    }

    Ok(())
}

/// One non-blocking drain of the active socket plus a `step` tick,
/// mirroring the single "step" tick the host loop is responsible for
/// driving per spec.md §5 — the REPL itself is the only legal blocking
/// point, same as the teacher's single-reactor main loop.
fn poll_once(manager: &mut Manager) {
    let mut buf = [0u8; 2048];
    loop {
        match manager.try_recv(&mut buf) {
            Ok(Some((n, peer))) => {
                if let Err(e) = manager.on_datagram(peer, &buf[..n]) {
                    warn!("datagram dispatch failed: {e}");
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
    let wait = manager.step();
    std::thread::sleep(Duration::from_millis(50).min(Duration::from_secs(wait)));
}
