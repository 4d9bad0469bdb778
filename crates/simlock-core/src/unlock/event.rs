use crate::ids::SlotId;
use crate::secret::SecretDigits;
use crate::sim::{MeVerifyResult, RetryCount, SlotRecord};

/// Inputs to the unlock state machine.
///
/// Events are applied strictly in arrival order on a single logical
/// thread of control. Verification results and lock-state reports are
/// delivered here by the orchestration layer, never as reentrant
/// callbacks.
#[derive(Debug, PartialEq)]
pub enum UnlockEvent {
    /// A slot became the active unlock target, with a fresh snapshot of
    /// its security state.
    SlotSelected { slot: SlotId, record: SlotRecord },

    /// The user submitted the current entry field.
    EntrySubmitted { text: SecretDigits },

    /// A PIN check finished. Counts are the post-attempt values read
    /// back from the telephony layer.
    PinResult {
        ok: bool,
        pin_retries: RetryCount,
        puk_retries: RetryCount,
    },

    /// A PUK check finished.
    PukResult { ok: bool, puk_retries: RetryCount },

    /// A network depersonalization check finished.
    MeResult { result: MeVerifyResult },

    /// The telephony layer reported a slot's security state, with a
    /// fresh snapshot. Also delivers repoll outcomes.
    LockKindChanged { slot: SlotId, record: SlotRecord },

    /// The post-success confirmation wait elapsed without a state
    /// change.
    ConfirmTimeout,

    /// The user abandoned the unlock flow.
    CancelRequested,

    /// Tear the session down (screen detach).
    Reset,
}
