//! Canonical progress state and its checksummed persistence.
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::checksum::{ChecksumGuard, Digest};
use crate::constants::{
    KEY_LEVEL_PROGRESS, KEY_LEVEL_PROGRESS_CHECKSUM, KEY_UNLOCKED_MILESTONES,
    KEY_UNLOCKED_MILESTONES_CHECKSUM,
};
use crate::level::{LevelId, Stars};
use crate::milestone::{MilestoneToken, UnlockedMilestones};
use crate::progress::LevelProgress;
use crate::storage::KeyValueStore;

/// Storage location of one checksummed record.
#[derive(Debug, Clone, Copy)]
struct RecordKeys {
    label: &'static str,
    value: &'static str,
    checksum: &'static str,
}

const PROGRESS_RECORD: RecordKeys = RecordKeys {
    label: "level progress",
    value: KEY_LEVEL_PROGRESS,
    checksum: KEY_LEVEL_PROGRESS_CHECKSUM,
};

const MILESTONES_RECORD: RecordKeys = RecordKeys {
    label: "milestones",
    value: KEY_UNLOCKED_MILESTONES,
    checksum: KEY_UNLOCKED_MILESTONES_CHECKSUM,
};

/// Returned by [`ProgressStore::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ResetOutcome {
    /// Dependent UI state was derived from the old progress and must reload.
    pub reload_required: bool,
}

/// Owns `levelProgress` and `unlockedMilestones` and is the only writer of
/// their storage records.
///
/// Storage failures are logged and never surfaced: progress stays usable in
/// memory even when the backend is unavailable.
#[derive(Debug)]
pub struct ProgressStore<S: KeyValueStore> {
    storage: S,
    guard: ChecksumGuard,
    progress: LevelProgress,
    milestones: UnlockedMilestones,
}

impl<S: KeyValueStore> ProgressStore<S> {
    /// Read both records from `storage`.
    ///
    /// A record that is missing or fails to parse falls back to empty. A
    /// checksum mismatch is logged and the record is used as read.
    pub fn load(storage: S, guard: ChecksumGuard) -> Self {
        let progress = load_record(&storage, &guard, PROGRESS_RECORD);
        let milestones = load_record(&storage, &guard, MILESTONES_RECORD);
        Self {
            storage,
            guard,
            progress,
            milestones,
        }
    }

    #[must_use]
    pub fn progress(&self) -> &LevelProgress {
        &self.progress
    }

    #[must_use]
    pub fn milestones(&self) -> &UnlockedMilestones {
        &self.milestones
    }

    #[must_use]
    pub fn guard(&self) -> &ChecksumGuard {
        &self.guard
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub fn total_stars(&self) -> u32 {
        self.progress.total_stars()
    }

    #[must_use]
    pub fn max_level(&self) -> u16 {
        self.progress.max_level()
    }

    #[must_use]
    pub fn stars_for(&self, level: LevelId) -> Stars {
        self.progress.stars_for(level)
    }

    /// Record a completed level. `stars` must be `1..=3`; anything else is
    /// rejected without touching state. Returns `true` when the best score
    /// improved and was persisted.
    pub fn record_level_result(&mut self, level: LevelId, stars: u8) -> bool {
        let Some(earned) = Stars::earned(stars) else {
            log::warn!("Ignoring result for level {level}: {stars} stars is out of range");
            return false;
        };
        if !level.is_valid() {
            log::warn!("Ignoring result for invalid level {level}");
            return false;
        }
        if !self.progress.record(level, earned) {
            return false;
        }
        self.persist_progress();
        true
    }

    /// Record that `token` has been shown. Returns `true` if it was new.
    pub fn mark_milestone_shown(&mut self, token: MilestoneToken) -> bool {
        if !self.milestones.insert(token) {
            log::debug!("Milestone {token} already recorded");
            return false;
        }
        self.persist_milestones();
        true
    }

    /// Replace both records wholesale, as a cloud import does.
    pub fn replace_all(&mut self, progress: LevelProgress, milestones: UnlockedMilestones) {
        self.progress = progress;
        self.milestones = milestones;
        self.persist_progress();
        self.persist_milestones();
    }

    /// Clear progress and milestones, in memory and in storage.
    pub fn reset(&mut self) -> ResetOutcome {
        self.progress = LevelProgress::new();
        self.milestones = UnlockedMilestones::new();
        for keys in [PROGRESS_RECORD, MILESTONES_RECORD] {
            for key in [keys.value, keys.checksum] {
                if let Err(err) = self.storage.remove(key) {
                    log::error!("Failed to remove {key} during reset: {err}");
                }
            }
        }
        log::info!("Progress reset");
        ResetOutcome {
            reload_required: true,
        }
    }

    /// Give three stars on every main level `1..=30`.
    #[cfg(any(test, feature = "debug-tools"))]
    pub fn unlock_all_debug(&mut self) {
        for n in 1..=crate::constants::DEBUG_UNLOCK_LAST_LEVEL {
            self.progress.set(LevelId::Main(n), Stars::MAX);
        }
        self.persist_progress();
    }

    fn persist_progress(&self) {
        write_record(&self.storage, &self.guard, PROGRESS_RECORD, &self.progress);
    }

    fn persist_milestones(&self) {
        write_record(&self.storage, &self.guard, MILESTONES_RECORD, &self.milestones);
    }
}

fn load_record<S, T>(storage: &S, guard: &ChecksumGuard, keys: RecordKeys) -> T
where
    S: KeyValueStore,
    T: DeserializeOwned + Serialize + Default,
{
    let raw = match storage.get(keys.value) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            log::warn!("Failed to read {}, starting empty: {err}", keys.label);
            return T::default();
        }
    };
    let value: T = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("Failed to parse {}, resetting: {err}", keys.label);
            return T::default();
        }
    };
    let stored = storage.get(keys.checksum).ok().flatten().map(Digest::from_stored);
    let intact = stored.is_some_and(|digest| guard.verify(&value, &digest));
    if !intact {
        log::warn!("Integrity check failed for {}.", keys.label);
    }
    value
}

/// Write the value, then the checksum of exactly the text written. The
/// checksum is skipped when the value write fails so it never describes a
/// value that is not in storage.
fn write_record<S, T>(storage: &S, guard: &ChecksumGuard, keys: RecordKeys, value: &T)
where
    S: KeyValueStore,
    T: Serialize,
{
    let serialized = match serde_json::to_string(value) {
        Ok(serialized) => serialized,
        Err(err) => {
            log::error!("Failed to serialize {}: {err}", keys.label);
            return;
        }
    };
    if let Err(err) = storage.set(keys.value, &serialized) {
        log::error!("Failed to persist {}: {err}", keys.label);
        return;
    }
    let digest = guard.digest_serialized(&serialized);
    if let Err(err) = storage.set(keys.checksum, digest.as_str()) {
        log::error!("Failed to persist {} checksum: {err}", keys.label);
    }
}
