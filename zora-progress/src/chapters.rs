//! Chapter layout and per-level lock state for the level map.
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::constants::BOSS_LEVEL;
use crate::level::{LevelId, SpecialStage, Stars};
use crate::progress::LevelProgress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub id: &'static str,
    pub levels: RangeInclusive<u16>,
    /// Review stage closing the chapter, if any.
    pub special: Option<SpecialStage>,
}

pub static CHAPTERS: [Chapter; 4] = [
    Chapter {
        id: "chapter_1",
        levels: 1..=7,
        special: Some(SpecialStage::S1),
    },
    Chapter {
        id: "chapter_2",
        levels: 8..=14,
        special: Some(SpecialStage::S2),
    },
    Chapter {
        id: "chapter_3",
        levels: 15..=21,
        special: Some(SpecialStage::S3),
    },
    Chapter {
        id: "chapter_4",
        levels: 22..=28,
        special: None,
    },
];

/// Chapter that shows `level` on the map. The boss stage sits in the last
/// chapter; unknown levels fall back to the first.
#[must_use]
pub fn chapter_for(level: LevelId) -> &'static Chapter {
    let found = match level {
        LevelId::Special(stage) => CHAPTERS.iter().find(|c| c.special == Some(stage)),
        LevelId::Main(BOSS_LEVEL) => CHAPTERS.last(),
        LevelId::Main(n) => CHAPTERS.iter().find(|c| c.levels.contains(&n)),
    };
    found.unwrap_or(&CHAPTERS[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stars", rename_all = "snake_case")]
pub enum LevelStatus {
    Locked,
    /// Playable, no stars yet.
    Open,
    Completed(Stars),
}

/// Lock state of one map node.
#[must_use]
pub fn level_status(progress: &LevelProgress, level: LevelId) -> LevelStatus {
    let stars = progress.stars_for(level);
    if stars > Stars::ZERO {
        return LevelStatus::Completed(stars);
    }
    let unlocked = match level {
        LevelId::Main(n) => n >= 1 && n <= progress.max_level(),
        LevelId::Special(stage) => {
            progress.stars_for(LevelId::Main(stage.trigger_level())) > Stars::ZERO
        }
    };
    if unlocked {
        LevelStatus::Open
    } else {
        LevelStatus::Locked
    }
}
