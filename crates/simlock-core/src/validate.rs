//! Entry length validation.
//!
//! Digit-only input is enforced by the entry widget; only length bounds
//! are checked here.

/// Shortest accepted PIN.
pub const MIN_PIN_LEN: usize = 4;
/// Longest accepted PIN, and the exact PUK length.
pub const MAX_PIN_LEN: usize = 8;

/// Length check for an entered code. PUKs must be exactly
/// [`MAX_PIN_LEN`] digits; PINs and ME passwords accept
/// [`MIN_PIN_LEN`]..=[`MAX_PIN_LEN`].
pub fn validate_entry(entry: &str, is_puk: bool) -> bool {
    let minimum = if is_puk { MAX_PIN_LEN } else { MIN_PIN_LEN };
    let len = entry.len();
    len >= minimum && len <= MAX_PIN_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_accepts_four_to_eight_digits() {
        for len in 0..=12 {
            let entry = "1".repeat(len);
            assert_eq!(
                validate_entry(&entry, false),
                (4..=8).contains(&len),
                "len={}",
                len
            );
        }
    }

    #[test]
    fn puk_accepts_exactly_eight_digits() {
        for len in 0..=12 {
            let entry = "2".repeat(len);
            assert_eq!(validate_entry(&entry, true), len == 8, "len={}", len);
        }
    }
}
