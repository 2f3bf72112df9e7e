//! Status event stream — §4.5, §5 ordering guarantees.

/// Which kind of server a session-scoped event pertains to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    Bootstrap,
    Dm,
}

/// Firmware/software package kind, carried on `PACKAGE_DOWNLOAD_*` and
/// `UPDATE_*` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Firmware,
    Software,
}

/// One status notification, per §4.5's enumerated tag list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Initialized,
    AuthenticationStarted(SessionType),
    AuthenticationFailed(SessionType),
    SessionStarted,
    Lwm2mSessionTypeStart(SessionType),
    SessionFailed,
    SessionFinished,
    PackageDownloadStarted(PackageKind),
    PackageDownloadProgress(PackageKind, u8),
    PackageDownloadFailed(PackageKind),
    PackageDownloadDone(PackageKind),
    UpdateStarted(PackageKind),
    UpdateSuccess(PackageKind),
    UpdateFailed(PackageKind),
    AgreementAsked(PackageKind),
    AgreementDenied(PackageKind),
    FallbackStarted,
    DownloadProgress(u8),
    Lwm2mSessionInactive,
}

/// Implemented by the host application to receive the status stream
/// (§6 "Implementer supplies `onStatus(Event)`").
pub trait StatusSink: Send {
    fn on_status(&mut self, event: Status);
}

/// No-op sink, useful when the host doesn't care about status events.
#[derive(Default)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn on_status(&mut self, _event: Status) {}
}

#[cfg(any(test, feature = "testing"))]
pub mod test_support {
    use super::*;

    /// Records every event it receives, in order — used to assert the
    /// §5 ordering contract in integration tests.
    #[derive(Default)]
    pub struct RecordingStatusSink {
        pub events: Vec<Status>,
    }

    impl StatusSink for RecordingStatusSink {
        fn on_status(&mut self, event: Status) {
            self.events.push(event);
        }
    }
}
