//! DTLS Connection Manager — §4.4.

pub mod connection;
pub mod engine;
pub mod manager;

pub use connection::{addr_eq, Connection, ConnectionSecurity};
pub use engine::{DtlsEngine, EngineEvent, PskProvider};
pub use manager::{ConnectionManager, DispatchOutcome, DEFAULT_NAT_TIMEOUT_SECS};
