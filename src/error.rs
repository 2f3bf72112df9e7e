//! Unified status/error type for the LwM2M client.
//!
//! Follows the same shape the rest of this crate uses throughout: a single
//! enum every subsystem funnels into, with per-subsystem `From` impls at the
//! boundary rather than a generic boxed error. `Lwm2mStatus` doubles as both
//! the "status code" returned by object/resource callbacks (§4.3) and the
//! general error type returned by credential/parameter store and transport
//! operations (§7).

use std::fmt;

/// Status/error taxonomy shared by every fallible operation in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lwm2mStatus {
    /// Operation completed successfully.
    CompletedOk,
    /// Unspecified failure.
    GeneralError,
    /// An argument was malformed or out of the accepted domain.
    InvalidArg,
    /// A fixed-size buffer was too small for the data being written.
    Overflow,
    /// A numeric value fell outside its valid range.
    IncorrectRange,
    /// The operation is defined but not implemented yet.
    NotYetImplemented,
    /// The operation is not supported for this object/resource.
    OpNotSupported,
    /// The operation is invalid for the current state machine state.
    InvalidState,
    /// A SHA digest comparison failed.
    ShaDigestMismatch,
    /// UDP `connect` failed.
    ConnectError,
    /// UDP `send` failed.
    SendError,
}

impl fmt::Display for Lwm2mStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CompletedOk => "completed ok",
            Self::GeneralError => "general error",
            Self::InvalidArg => "invalid argument",
            Self::Overflow => "overflow",
            Self::IncorrectRange => "incorrect range",
            Self::NotYetImplemented => "not yet implemented",
            Self::OpNotSupported => "operation not supported",
            Self::InvalidState => "invalid state",
            Self::ShaDigestMismatch => "SHA digest mismatch",
            Self::ConnectError => "connect error",
            Self::SendError => "send error",
        };
        write!(f, "{s}")
    }
}

impl std::error::Error for Lwm2mStatus {}

/// Outcome of [`crate::session::manager::SessionManager::push`].
///
/// Kept as its own type (rather than folded into [`Lwm2mStatus`]) because a
/// push request's `Busy` outcome is routine flow control, not a failure —
/// matching spec.md §7's explicit three-way `push` ternary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// The push was accepted and a CoAP request was sent.
    Initiated,
    /// Another push (or a package download) is already in flight.
    Busy,
    /// The push could not be initiated (no registered server, socket error).
    Failed,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Lwm2mStatus>;
