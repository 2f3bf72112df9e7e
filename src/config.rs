//! Runtime tunables — §5, §9.
//!
//! Everything here is a default a deployment can override; none of it is
//! persisted state (that's [`crate::credential_store`]/[`crate::parameter_store`]).

use serde::{Deserialize, Serialize};

use crate::dtls::DEFAULT_NAT_TIMEOUT_SECS;

/// Core runtime configuration for the session/transport subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Idle interval (seconds) after which an outbound send triggers a
    /// DTLS resume attempt before the datagram is written (§4.4). `0`
    /// disables resume/rehandshake entirely.
    pub nat_timeout_secs: i64,

    /// Seconds to wait before the first `step` tick after `connect` (§4.5).
    pub initial_step_delay_secs: u64,

    /// Seconds to wait before the `step` tick fires after `update`, to
    /// flush a registration update promptly (§4.5).
    pub update_step_delay_secs: u64,

    /// Path to the credential store file (§4.1, §6).
    pub credential_store_path: String,

    /// Directory holding the parameter-store primary/backup file pairs
    /// (§4.2, §6).
    pub parameter_store_dir: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            nat_timeout_secs: DEFAULT_NAT_TIMEOUT_SECS,
            initial_step_delay_secs: 1,
            update_step_delay_secs: 1,
            credential_store_path: "clientConfig.txt".to_string(),
            parameter_store_dir: ".".to_string(),
        }
    }
}
