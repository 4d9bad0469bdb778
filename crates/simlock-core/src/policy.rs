use serde::{Deserialize, Serialize};

/// Unlock flow tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockPolicy {
    /// How long to wait for a lock-state change after a successful
    /// verification before force-dismissing, in milliseconds.
    pub confirm_timeout_ms: u64,
    /// Number of SIM slots the platform exposes.
    pub slot_count: u8,
    /// Show a transient "accepted" notice on PIN/PUK success.
    pub show_pass_notice: bool,
}

impl Default for UnlockPolicy {
    fn default() -> Self {
        Self {
            confirm_timeout_ms: 6_000,
            slot_count: 4,
            show_pass_notice: false,
        }
    }
}
