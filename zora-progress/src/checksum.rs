//! Tamper-evidence digests for persisted and synced progress.
//!
//! The digest is a salted 32-bit rolling hash (`h = h * 31 + unit`) over the
//! UTF-16 code units of the canonical JSON text. It detects corruption and
//! casual edits; it is not a cryptographic integrity check.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::DEFAULT_CHECKSUM_SALT;

/// Hexadecimal digest as stored next to each record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a digest read back from storage or the network.
    #[must_use]
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes and verifies digests with a fixed shared salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumGuard {
    salt: String,
}

impl Default for ChecksumGuard {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKSUM_SALT)
    }
}

impl ChecksumGuard {
    #[must_use]
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Digest of `value`'s canonical JSON serialization.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized to JSON.
    pub fn compute<T: Serialize + ?Sized>(&self, value: &T) -> Result<Digest, serde_json::Error> {
        let canonical = serde_json::to_string(value)?;
        Ok(self.digest_serialized(&canonical))
    }

    /// Digest of text that is already the canonical serialization.
    ///
    /// Persistence uses this so the checksum is derived from the exact string
    /// that was written.
    #[must_use]
    pub fn digest_serialized(&self, canonical: &str) -> Digest {
        let hash = canonical
            .encode_utf16()
            .chain(self.salt.encode_utf16())
            .fold(0_i32, |hash, unit| {
                hash.wrapping_mul(31).wrapping_add(i32::from(unit))
            });
        Digest(signed_hex(hash))
    }

    /// Recompute and compare. Serialization failures count as a mismatch.
    #[must_use]
    pub fn verify<T: Serialize + ?Sized>(&self, value: &T, stored: &Digest) -> bool {
        self.compute(value).is_ok_and(|digest| &digest == stored)
    }
}

/// Signed hexadecimal rendering: `-` followed by the magnitude for negatives.
fn signed_hex(value: i32) -> String {
    let wide = i64::from(value);
    if wide < 0 {
        format!("-{:x}", -wide)
    } else {
        format!("{wide:x}")
    }
}
