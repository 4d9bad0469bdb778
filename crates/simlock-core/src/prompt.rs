use serde::{Deserialize, Serialize};

use crate::sim::{MeCategory, RetryCount};

/// What to tell the user, as a value.
///
/// The state machine never assembles display strings. The prompt sink
/// resolves each variant to localized text; retry counts and the ME
/// lock category travel as parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prompt {
    /// Ask for the SIM PIN. `wrong` prefixes a wrong-code notice.
    EnterPin { wrong: bool, retries: RetryCount },
    /// Ask for the PUK.
    EnterPuk { wrong: bool, retries: RetryCount },
    /// Ask for the network unlock password. `category` selects the
    /// lock-type label.
    EnterMe {
        wrong: bool,
        category: MeCategory,
        retries: RetryCount,
    },
    /// Ask for the replacement PIN. `mismatch` prefixes a
    /// confirmation-mismatch notice.
    EnterNewPin { mismatch: bool },
    /// Ask to re-enter the replacement PIN.
    ConfirmNewPin,
    /// PUK entry has the wrong length.
    InvalidPuk,
    /// PIN entry outside the accepted length range.
    InvalidPin,
    /// Generic code-length hint (new PIN and ME entry).
    CodeLength,
    /// Clear the message area.
    Blank,
    /// Wrong PUK notice carrying the remaining count.
    WrongPuk { retries: RetryCount },
    /// Wrong entry notice without a count.
    WrongEntry,
    /// PUK retries exhausted, the SIM cannot be recovered by entry.
    SimPermanentlyLocked,
    /// ME retries exhausted for this slot.
    MeSlotLocked,
    /// ME check failed in the telephony service.
    MeUnlockFailed,
    PinAccepted,
    PukAccepted,
}
