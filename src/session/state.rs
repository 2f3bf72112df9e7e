//! Session state machine — §3.
//!
//! `Init → Bootstrapping → BootstrapDone → RegisterRequired → Registering →
//! Ready → {UpdateRequired → Ready} → Deregistering → Closed`, with the one
//! documented shortcut: a transient `Bootstrapping` failure resets to
//! `Init` to allow retry, rather than failing the whole machine.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Bootstrapping,
    BootstrapDone,
    RegisterRequired,
    Registering,
    /// At least one DM server has an accepted, unexpired registration.
    Ready,
    UpdateRequired,
    Deregistering,
    Closed,
}

impl SessionState {
    /// Whether `self → next` is one of the transitions spec.md §3 allows.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Init, Bootstrapping)
                | (Bootstrapping, BootstrapDone)
                | (Bootstrapping, Init) // transient failure retry
                | (BootstrapDone, RegisterRequired)
                | (Init, RegisterRequired) // credentials already present, no bootstrap needed
                | (RegisterRequired, Registering)
                | (Registering, Ready)
                | (Registering, RegisterRequired) // registration failure, retry
                | (Ready, UpdateRequired)
                | (UpdateRequired, Ready)
                | (UpdateRequired, RegisterRequired) // update failure, re-register from scratch
                | (Ready, Deregistering)
                | (RegisterRequired, Deregistering)
                | (Registering, Deregistering)
                | (Bootstrapping, Deregistering)
                | (Deregistering, Closed)
                | (_, Closed) // free() is always legal
        )
    }

    pub fn is_ready(self) -> bool {
        matches!(self, SessionState::Ready)
    }
}
