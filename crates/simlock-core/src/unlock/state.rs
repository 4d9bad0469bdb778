use serde::{Deserialize, Serialize};

/// Stage of the unlock interaction for the active slot.
///
/// Owned exclusively by the state machine. Reset whenever a new slot
/// becomes active or the slot leaves a PIN/PUK/ME state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    /// No unlock interaction is showing.
    Idle,
    /// Collecting the SIM PIN.
    EnterPin,
    /// Collecting the PUK.
    EnterPuk,
    /// PUK accepted locally, collecting the replacement PIN.
    EnterNewPin,
    /// Collecting the replacement PIN a second time.
    ReenterNewPin,
    /// PUK sequence complete, submission in flight.
    EnterFinish,
    /// Collecting the network unlock password.
    EnterMe,
    /// Verification passed, waiting for the lock state to change.
    ConfirmWait,
    /// Waiting for a repolled slot to report its state.
    RepollWait,
    /// Retries exhausted. Terminal.
    PermanentlyLocked,
}

impl EntryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryState::PermanentlyLocked)
    }
}
