//! SIM card security state as reported by the telephony layer.

mod lock_kind;
mod me_category;
mod retry;
mod slot_record;

pub use lock_kind::LockKind;
pub use me_category::MeCategory;
pub use retry::{RetryCount, RetryKind};
pub use slot_record::SlotRecord;

/// Outcome of a network depersonalization check.
///
/// Remote-call failures are reported as `ServiceFailure` and are not
/// retried; see the ME handling in the unlock state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MeVerifyResult {
    Pass,
    IncorrectPassword,
    ServiceFailure,
}
