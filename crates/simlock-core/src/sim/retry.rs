use serde::{Deserialize, Serialize};

/// Which retry counter of a slot is being queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryKind {
    Pin,
    Puk,
    Me,
}

/// Remaining attempts for a PIN, PUK, or ME check.
///
/// The platform may not report a count, in which case it stays
/// `Unknown`. `Remaining(0)` means permanently locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryCount {
    Unknown,
    Remaining(u32),
}

impl RetryCount {
    /// Map a platform-reported count where a negative value means
    /// "not reported".
    pub fn from_reported(count: i32) -> Self {
        if count < 0 {
            RetryCount::Unknown
        } else {
            RetryCount::Remaining(count as u32)
        }
    }

    pub fn exhausted(&self) -> bool {
        matches!(self, RetryCount::Remaining(0))
    }

    /// One attempt consumed. `Unknown` stays `Unknown`.
    pub fn decremented(&self) -> Self {
        match self {
            RetryCount::Unknown => RetryCount::Unknown,
            RetryCount::Remaining(n) => RetryCount::Remaining(n.saturating_sub(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_reported_count_is_unknown() {
        assert_eq!(RetryCount::from_reported(-1), RetryCount::Unknown);
        assert_eq!(RetryCount::from_reported(3), RetryCount::Remaining(3));
    }

    #[test]
    fn only_zero_is_exhausted() {
        assert!(RetryCount::Remaining(0).exhausted());
        assert!(!RetryCount::Remaining(1).exhausted());
        assert!(!RetryCount::Unknown.exhausted());
    }

    #[test]
    fn decrement_saturates_and_keeps_unknown() {
        assert_eq!(
            RetryCount::Remaining(2).decremented(),
            RetryCount::Remaining(1)
        );
        assert_eq!(
            RetryCount::Remaining(0).decremented(),
            RetryCount::Remaining(0)
        );
        assert_eq!(RetryCount::Unknown.decremented(), RetryCount::Unknown);
    }
}
