use anyhow::Result;

use crate::ids::SlotId;

/// Signals from the unlock flow to the surrounding screen shell.
#[async_trait::async_trait]
pub trait UnlockCallbackPort: Send + Sync {
    /// The user interacted with the flow; keep the screen awake.
    async fn report_user_activity(&self) -> Result<()>;

    /// End the unlock session. `advance` moves on to the next security
    /// screen instead of returning.
    async fn dismiss(&self, advance: bool) -> Result<()>;

    /// The slot is considered unlocked.
    async fn report_unlocked(&self, slot: SlotId) -> Result<()>;
}
