//! Player rank derived from progress: avatar tier, title key and sprite.
use serde::{Deserialize, Serialize};

use crate::milestone::StarThreshold;
use crate::progress::LevelProgress;

/// Rank shown on the map header and profile, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarTier {
    Apprentice,
    Adventurer,
    Knight,
    Wizard,
    DragonHero,
    PerfectWarrior,
    GodDomain,
}

impl AvatarTier {
    pub const ALL: [Self; 7] = [
        Self::Apprentice,
        Self::Adventurer,
        Self::Knight,
        Self::Wizard,
        Self::DragonHero,
        Self::PerfectWarrior,
        Self::GodDomain,
    ];

    /// Current rank, first match wins: boss cleared, perfect campaign, then
    /// star totals from the top down.
    #[must_use]
    pub fn for_progress(progress: &LevelProgress) -> Self {
        if progress.boss_cleared() {
            return Self::GodDomain;
        }
        if progress.is_perfect_campaign() {
            return Self::PerfectWarrior;
        }
        let total = progress.total_stars();
        StarThreshold::ALL
            .into_iter()
            .rev()
            .find(|t| total >= t.stars())
            .map_or(Self::Apprentice, Self::from)
    }

    /// 1-based rank; 6 and 7 are the perfect and god tiers.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Apprentice => 1,
            Self::Adventurer => 2,
            Self::Knight => 3,
            Self::Wizard => 4,
            Self::DragonHero => 5,
            Self::PerfectWarrior => 6,
            Self::GodDomain => 7,
        }
    }

    /// Translation key of the title.
    #[must_use]
    pub const fn title_key(self) -> &'static str {
        match self {
            Self::Apprentice => "title_apprentice",
            Self::Adventurer => "title_adventurer",
            Self::Knight => "title_knight",
            Self::Wizard => "title_wizard",
            Self::DragonHero => "title_dragon_hero",
            Self::PerfectWarrior => "title_perfect_warrior",
            Self::GodDomain => "title_god_domain",
        }
    }

    #[must_use]
    pub fn sprite(self) -> String {
        format!("assets/sprites/title_rank_{}.png", self.rank())
    }

    /// Whether `progress` has earned this title (independently of rank order).
    #[must_use]
    pub fn is_unlocked(self, progress: &LevelProgress) -> bool {
        match self {
            Self::Apprentice => true,
            Self::PerfectWarrior => progress.is_perfect_campaign(),
            Self::GodDomain => progress.boss_cleared(),
            tier => StarThreshold::ALL
                .into_iter()
                .find(|t| Self::from(*t) == tier)
                .is_some_and(|t| progress.total_stars() >= t.stars()),
        }
    }
}

impl From<StarThreshold> for AvatarTier {
    fn from(threshold: StarThreshold) -> Self {
        match threshold {
            StarThreshold::Adventurer => Self::Adventurer,
            StarThreshold::Knight => Self::Knight,
            StarThreshold::Wizard => Self::Wizard,
            StarThreshold::DragonHero => Self::DragonHero,
        }
    }
}

/// One row of the profile's title list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleEntry {
    pub tier: AvatarTier,
    pub title_key: String,
    pub sprite: String,
    pub unlocked: bool,
}

/// All titles in rank order with their unlock state.
#[must_use]
pub fn title_catalog(progress: &LevelProgress) -> Vec<TitleEntry> {
    AvatarTier::ALL
        .into_iter()
        .map(|tier| TitleEntry {
            tier,
            title_key: tier.title_key().to_string(),
            sprite: tier.sprite(),
            unlocked: tier.is_unlocked(progress),
        })
        .collect()
}
