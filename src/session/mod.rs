//! Session Manager — §4.5.

pub mod events;
pub mod manager;
pub mod state;

pub use events::{NullStatusSink, PackageKind, SessionType, Status, StatusSink};
pub use manager::SessionManager;
pub use state::SessionState;
