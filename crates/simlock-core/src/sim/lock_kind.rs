use serde::{Deserialize, Serialize};

/// Security state of a SIM slot.
///
/// The telephony layer is the authoritative source; the unlock flow
/// only mirrors the last reported value per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    /// No state reported yet.
    Unknown,
    /// SIM PIN must be supplied.
    PinRequired,
    /// PIN retries exhausted, PUK must be supplied.
    PukRequired,
    /// Carrier network personalization lock (ME lock).
    NetworkLocked,
    /// Card is usable.
    Ready,
    /// No card in the slot.
    Absent,
}

impl LockKind {
    /// Whether this state asks the user for PIN, PUK, or ME entry.
    pub fn requires_entry(&self) -> bool {
        matches!(
            self,
            LockKind::PinRequired | LockKind::PukRequired | LockKind::NetworkLocked
        )
    }
}
