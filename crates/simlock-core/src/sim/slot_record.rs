use serde::{Deserialize, Serialize};

use super::{LockKind, MeCategory, RetryCount};

/// Snapshot of one slot's security state and retry counters.
///
/// The unlock state machine keeps one record per observed slot,
/// refreshed wholesale whenever the telephony layer reports. The ME
/// count is additionally decremented locally on each failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub kind: LockKind,
    pub pin_retries: RetryCount,
    pub puk_retries: RetryCount,
    pub me_retries: RetryCount,
    pub me_category: MeCategory,
}

impl Default for SlotRecord {
    fn default() -> Self {
        Self {
            kind: LockKind::Unknown,
            pin_retries: RetryCount::Unknown,
            puk_retries: RetryCount::Unknown,
            me_retries: RetryCount::Unknown,
            me_category: MeCategory::Network,
        }
    }
}

impl SlotRecord {
    pub fn with_kind(kind: LockKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}
