use anyhow::Result;

use crate::ids::SlotId;
use crate::secret::SecretDigits;
use crate::sim::{LockKind, MeCategory, MeVerifyResult, RetryCount, RetryKind};

/// Telephony-side verification service.
///
/// Checks block on the remote service and must be driven from a task,
/// never from the machine's event loop. State and counter reads are
/// cheap local queries.
#[async_trait::async_trait]
pub trait SimVerificationPort: Send + Sync {
    /// Supply the SIM PIN. `Ok(true)` means the card accepted it.
    async fn supply_pin(&self, slot: SlotId, pin: SecretDigits) -> Result<bool>;

    /// Supply the PUK together with the replacement PIN.
    async fn supply_puk(
        &self,
        slot: SlotId,
        puk: SecretDigits,
        new_pin: SecretDigits,
    ) -> Result<bool>;

    /// Supply the network depersonalization password.
    async fn supply_me(&self, slot: SlotId, password: SecretDigits) -> Result<MeVerifyResult>;

    fn lock_kind(&self, slot: SlotId) -> LockKind;

    fn retry_count(&self, slot: SlotId, kind: RetryKind) -> RetryCount;

    fn me_category(&self, slot: SlotId) -> MeCategory;

    /// Re-query a slot's lock state, returning the freshly reported
    /// kind.
    async fn repoll(&self, slot: SlotId) -> Result<LockKind>;
}
