use chrono::{DateTime, Utc};

use crate::ids::SlotId;
use crate::prompt::Prompt;
use crate::secret::SecretDigits;

/// Side effects produced by unlock state transitions.
///
/// Executed by the orchestration layer against the ports; the machine
/// itself performs no IO.
#[derive(Debug, PartialEq)]
pub enum UnlockAction {
    /// Replace the message area content.
    SetMessage(Prompt),

    /// Show a transient or blocking notice without touching the
    /// message area.
    ShowNotice { prompt: Prompt, blocking: bool },

    /// Dispatch a PIN check to the verification service.
    SubmitPin { slot: SlotId, pin: SecretDigits },

    /// Dispatch a PUK unlock (PUK plus replacement PIN).
    SubmitPuk {
        slot: SlotId,
        puk: SecretDigits,
        new_pin: SecretDigits,
    },

    /// Dispatch a network depersonalization check.
    SubmitMe { slot: SlotId, password: SecretDigits },

    /// Ask the verification service to re-poll a slot's lock state.
    Repoll { slot: SlotId },

    /// Arm the post-success confirmation timer.
    StartConfirmTimer { deadline: DateTime<Utc> },

    /// Disarm the confirmation timer if armed.
    CancelConfirmTimer,

    ReportUserActivity,

    /// The slot is considered unlocked even though no state change
    /// arrived in time.
    ReportUnlocked { slot: SlotId },

    /// End the unlock session.
    Dismiss { advance: bool },
}
