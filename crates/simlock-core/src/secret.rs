use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Entered PIN/PUK digits that must never be logged or serialized.
///
/// - no `Clone`
/// - no `Serialize` / `Deserialize`
/// - `Debug` / `Display` never print the real content
/// - memory is wiped on drop
/// - equality is constant-time
pub struct SecretDigits {
    inner: String,
}

impl SecretDigits {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Borrow the digits. Only borrowed access is offered.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl PartialEq for SecretDigits {
    fn eq(&self, other: &Self) -> bool {
        self.inner.len() == other.inner.len()
            && bool::from(self.inner.as_bytes().ct_eq(other.inner.as_bytes()))
    }
}

impl Eq for SecretDigits {}

impl fmt::Debug for SecretDigits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretDigits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecretDigits {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Drop for SecretDigits {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}
