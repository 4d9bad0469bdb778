use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Physical SIM slot position on a multi-SIM device, counted from zero.
///
/// All per-slot state in the unlock flow is keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(u8);

impl SlotId {
    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// One-based number as shown to users ("SIM 1", "SIM 2", ...).
    pub fn display_number(&self) -> u8 {
        self.0 + 1
    }
}

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for SlotId {
    fn from(index: u8) -> Self {
        Self(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_number_is_one_based() {
        assert_eq!(SlotId::new(0).display_number(), 1);
        assert_eq!(SlotId::new(3).display_number(), 4);
    }

    #[test]
    fn slot_ids_order_by_index() {
        assert!(SlotId::new(0) < SlotId::new(1));
    }
}
