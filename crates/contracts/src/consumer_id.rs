//! ConsumerId - opaque, cheap-to-clone consumer identity
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Opaque consumer identifier.
///
/// Generated from 16 random bytes and rendered in the familiar
/// `8-4-4-4-12` hex grouping. Only uniqueness matters: the value is compared
/// for equality and never parsed, ordered, or checked for RFC 4122 layout.
///
/// # Examples
/// ```
/// use contracts::ConsumerId;
///
/// let a = ConsumerId::generate();
/// let b = a.clone(); // O(1) - just increments ref count
/// assert_eq!(a, b);
/// assert_ne!(a, ConsumerId::generate());
/// assert_eq!(a.as_str().len(), 36);
/// ```
#[derive(Clone)]
pub struct ConsumerId(Arc<str>);

impl ConsumerId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self::from_bytes(&bytes)
    }

    fn from_bytes(bytes: &[u8; 16]) -> Self {
        let mut s = String::with_capacity(36);
        for (i, b) in bytes.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                s.push('-');
            }
            // Writing to a String cannot fail
            let _ = write!(s, "{b:02x}");
        }
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConsumerId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConsumerId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ConsumerId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsumerId({:?})", self.0)
    }
}

impl PartialEq for ConsumerId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ConsumerId {}

impl PartialEq<str> for ConsumerId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl Hash for ConsumerId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for ConsumerId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConsumerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
