//! Per-level best star ratings and the queries derived from them.
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::constants::{BOSS_LEVEL, LAST_MAIN_LEVEL};
use crate::level::{LevelId, Stars};

/// Best stars per level. An absent level is equivalent to zero stars.
///
/// Serializes to a JSON object whose keys are the level ids, numbered levels
/// first in ascending order, then `S1`, `S2`, `S3`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LevelProgress {
    levels: BTreeMap<LevelId, Stars>,
}

impl LevelProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result, keeping the best score. Returns `true` when the
    /// stored value improved.
    pub fn record(&mut self, level: LevelId, stars: Stars) -> bool {
        if !level.is_valid() || stars <= self.stars_for(level) {
            return false;
        }
        self.levels.insert(level, stars);
        true
    }

    #[must_use]
    pub fn stars_for(&self, level: LevelId) -> Stars {
        self.levels.get(&level).copied().unwrap_or(Stars::ZERO)
    }

    #[must_use]
    pub fn total_stars(&self) -> u32 {
        self.levels.values().map(|s| u32::from(s.get())).sum()
    }

    /// Highest level the player may open: one past the highest numbered
    /// level on record, or 1 when no numbered level is recorded.
    #[must_use]
    pub fn max_level(&self) -> u16 {
        self.highest_played().map_or(1, |n| n.saturating_add(1))
    }

    /// Highest numbered level on record.
    #[must_use]
    pub fn highest_played(&self) -> Option<u16> {
        self.levels.keys().filter_map(|id| id.number()).max()
    }

    /// Level the map should focus when resuming play.
    #[must_use]
    pub fn resume_level(&self) -> u16 {
        self.highest_played().unwrap_or(1)
    }

    /// Every campaign level `1..=28` holds exactly three stars.
    #[must_use]
    pub fn is_perfect_campaign(&self) -> bool {
        (1..=LAST_MAIN_LEVEL).all(|n| self.stars_for(LevelId::Main(n)).is_perfect())
    }

    #[must_use]
    pub fn boss_cleared(&self) -> bool {
        self.stars_for(LevelId::Main(BOSS_LEVEL)) > Stars::ZERO
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LevelId, Stars)> + '_ {
        self.levels.iter().map(|(id, stars)| (*id, *stars))
    }

    /// Set a level outright, bypassing the best-score rule.
    #[cfg(any(test, feature = "debug-tools"))]
    pub(crate) fn set(&mut self, level: LevelId, stars: Stars) {
        self.levels.insert(level, stars);
    }
}

impl FromIterator<(LevelId, Stars)> for LevelProgress {
    fn from_iter<I: IntoIterator<Item = (LevelId, Stars)>>(iter: I) -> Self {
        Self {
            levels: iter.into_iter().filter(|(id, _)| id.is_valid()).collect(),
        }
    }
}

/// Lenient decoding: entries with unknown keys or out-of-range values are
/// dropped so one bad entry never discards the whole record.
impl<'de> Deserialize<'de> for LevelProgress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut levels = BTreeMap::new();
        for (key, value) in raw {
            let Ok(level) = key.parse::<LevelId>() else {
                log::warn!("Dropping progress entry with unknown level id `{key}`");
                continue;
            };
            let stars = value
                .as_u64()
                .and_then(|v| u8::try_from(v).ok())
                .and_then(Stars::new);
            match stars {
                Some(stars) => {
                    levels.insert(level, stars);
                }
                None => log::warn!("Dropping out-of-range stars {value} for level {level}"),
            }
        }
        Ok(Self { levels })
    }
}
