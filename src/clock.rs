//! Injectable wall-clock source.
//!
//! The DTLS connection manager's outbound-send policy (§4.4) computes
//! `ΔS = now − lastSend` and treats `ΔS < 0` as a wall-clock rewind that
//! forces a rehandshake — a distinction `std::time::Instant` can't express
//! since it's monotonic by construction. A `Clock` port, in the same spirit
//! as the teacher's `Esp32TimeAdapter`, lets tests inject a clock that can
//! actually run backwards.

pub trait Clock: Send {
    /// Current wall-clock time, in seconds. Not required to be monotonic.
    fn now_secs(&self) -> i64;
}

/// Real wall clock, backed by `SystemTime`.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod test_support {
    use super::Clock;
    use std::cell::Cell;

    /// Settable clock for exercising NAT-timeout and rewind scenarios.
    pub struct TestClock(Cell<i64>);

    impl TestClock {
        pub fn new(start: i64) -> Self {
            Self(Cell::new(start))
        }

        pub fn set(&self, t: i64) {
            self.0.set(t);
        }

        pub fn advance(&self, secs: i64) {
            self.0.set(self.0.get() + secs);
        }
    }

    impl Clock for TestClock {
        fn now_secs(&self) -> i64 {
            self.0.get()
        }
    }
}
