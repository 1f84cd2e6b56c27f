//! Shareable sync codes (`ZORA-XXXX`) and their local storage slot.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::{KEY_SYNC_ID, SYNC_ID_ALPHABET, SYNC_ID_PREFIX, SYNC_ID_SUFFIX_LEN};
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncIdError {
    #[error("sync code must start with ZORA-")]
    MissingPrefix,
    #[error("sync code must have 4 characters after ZORA-")]
    WrongLength,
    #[error("sync code contains unsupported character `{0}`")]
    InvalidCharacter(char),
}

/// A validated sync code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SyncId(String);

impl SyncId {
    /// Draw a fresh code. No remote is contacted.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut code = String::with_capacity(SYNC_ID_PREFIX.len() + SYNC_ID_SUFFIX_LEN);
        code.push_str(SYNC_ID_PREFIX);
        for _ in 0..SYNC_ID_SUFFIX_LEN {
            let idx = rng.gen_range(0..SYNC_ID_ALPHABET.len());
            code.push(char::from(SYNC_ID_ALPHABET[idx]));
        }
        Self(code)
    }

    /// Validate user input. Surrounding whitespace is ignored and letters are
    /// upper-cased first.
    ///
    /// # Errors
    ///
    /// Returns an error when the prefix, length or alphabet does not match.
    pub fn parse(input: &str) -> Result<Self, SyncIdError> {
        let normalized = input.trim().to_ascii_uppercase();
        let suffix = normalized
            .strip_prefix(SYNC_ID_PREFIX)
            .ok_or(SyncIdError::MissingPrefix)?;
        if suffix.chars().count() != SYNC_ID_SUFFIX_LEN {
            return Err(SyncIdError::WrongLength);
        }
        if let Some(bad) = suffix
            .chars()
            .find(|c| !c.is_ascii() || !SYNC_ID_ALPHABET.contains(&(*c as u8)))
        {
            return Err(SyncIdError::InvalidCharacter(bad));
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SyncId {
    type Error = SyncIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SyncId> for String {
    fn from(id: SyncId) -> Self {
        id.0
    }
}

/// Read the bound sync code. Unreadable or invalid values count as unbound.
pub fn load_sync_id<S: KeyValueStore>(storage: &S) -> Option<SyncId> {
    let raw = match storage.get(KEY_SYNC_ID) {
        Ok(raw) => raw?,
        Err(err) => {
            log::warn!("Failed to read sync code: {err}");
            return None;
        }
    };
    if raw.is_empty() {
        return None;
    }
    SyncId::parse(&raw)
        .inspect_err(|err| log::warn!("Ignoring stored sync code `{raw}`: {err}"))
        .ok()
}

pub fn store_sync_id<S: KeyValueStore>(storage: &S, id: &SyncId) {
    if let Err(err) = storage.set(KEY_SYNC_ID, id.as_str()) {
        log::error!("Failed to persist sync code: {err}");
    }
}

pub fn clear_sync_id<S: KeyValueStore>(storage: &S) {
    if let Err(err) = storage.remove(KEY_SYNC_ID) {
        log::error!("Failed to clear sync code: {err}");
    }
}
