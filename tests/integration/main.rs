//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the `testing`-feature port fakes. All tests run on the host
//! with no real hardware or network required.

mod dtls_manager_scenarios;
mod parameter_store_crash_safety;
mod session_scenarios;
