//! Milestone tokens, the shown-milestone set and the next-milestone evaluator.
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::constants::{STARS_ADVENTURER, STARS_DRAGON_HERO, STARS_KNIGHT, STARS_WIZARD};
use crate::level::{LevelId, SpecialStage};
use crate::progress::LevelProgress;

/// Star totals that grant a new title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StarThreshold {
    Adventurer,
    Knight,
    Wizard,
    DragonHero,
}

impl StarThreshold {
    pub const ALL: [Self; 4] = [Self::Adventurer, Self::Knight, Self::Wizard, Self::DragonHero];

    #[must_use]
    pub const fn stars(self) -> u32 {
        match self {
            Self::Adventurer => STARS_ADVENTURER,
            Self::Knight => STARS_KNIGHT,
            Self::Wizard => STARS_WIZARD,
            Self::DragonHero => STARS_DRAGON_HERO,
        }
    }

    #[must_use]
    pub fn from_stars(stars: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| u64::from(t.stars()) == stars)
    }
}

/// A milestone that is celebrated once and then recorded as shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MilestoneToken {
    Stars(StarThreshold),
    Special(SpecialStage),
    PerfectWarrior,
    GodDomain,
}

/// Evaluation order. The first eligible, unshown token wins.
pub const MILESTONE_PRIORITY: [MilestoneToken; 9] = [
    MilestoneToken::Special(SpecialStage::S1),
    MilestoneToken::Stars(StarThreshold::Adventurer),
    MilestoneToken::Special(SpecialStage::S2),
    MilestoneToken::Stars(StarThreshold::Knight),
    MilestoneToken::Special(SpecialStage::S3),
    MilestoneToken::Stars(StarThreshold::Wizard),
    MilestoneToken::Stars(StarThreshold::DragonHero),
    MilestoneToken::PerfectWarrior,
    MilestoneToken::GodDomain,
];

impl MilestoneToken {
    /// Whether `progress` satisfies this milestone's condition.
    #[must_use]
    pub fn is_met(self, progress: &LevelProgress) -> bool {
        match self {
            Self::Stars(threshold) => progress.total_stars() >= threshold.stars(),
            Self::Special(stage) => progress.max_level() >= stage.gate_level(),
            Self::PerfectWarrior => progress.is_perfect_campaign(),
            Self::GodDomain => progress.boss_cleared(),
        }
    }

    /// The special level a challenge from this milestone jumps into.
    #[must_use]
    pub const fn challenge_level(self) -> Option<LevelId> {
        match self {
            Self::Special(stage) => Some(LevelId::Special(stage)),
            _ => None,
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "t_perfect" => Some(Self::PerfectWarrior),
            "t_god" => Some(Self::GodDomain),
            other => SpecialStage::parse(other)
                .map(Self::Special)
                .or_else(|| other.parse::<u64>().ok().and_then(StarThreshold::from_stars).map(Self::Stars)),
        }
    }
}

impl fmt::Display for MilestoneToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stars(threshold) => write!(f, "{}", threshold.stars()),
            Self::Special(stage) => f.write_str(stage.as_str()),
            Self::PerfectWarrior => f.write_str("t_perfect"),
            Self::GodDomain => f.write_str("t_god"),
        }
    }
}

impl Serialize for MilestoneToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Stars(threshold) => serializer.serialize_u32(threshold.stars()),
            other => serializer.collect_str(other),
        }
    }
}

struct MilestoneVisitor;

impl Visitor<'_> for MilestoneVisitor {
    type Value = MilestoneToken;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a star threshold (10, 25, 40, 55) or S1, S2, S3, t_perfect, t_god")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        StarThreshold::from_stars(v)
            .map(MilestoneToken::Stars)
            .ok_or_else(|| E::custom(format!("unknown star milestone {v}")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map_err(|_| E::custom(format!("unknown star milestone {v}")))
            .and_then(|v| self.visit_u64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        MilestoneToken::parse(v).ok_or_else(|| E::custom(format!("unknown milestone `{v}`")))
    }
}

impl<'de> Deserialize<'de> for MilestoneToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MilestoneVisitor)
    }
}

/// Milestones already celebrated, in the order they were shown.
///
/// Append-only: a token is stored at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UnlockedMilestones {
    tokens: Vec<MilestoneToken>,
}

impl UnlockedMilestones {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `token` unless it is already present. Returns `true` if added.
    pub fn insert(&mut self, token: MilestoneToken) -> bool {
        if self.contains(token) {
            return false;
        }
        self.tokens.push(token);
        true
    }

    #[must_use]
    pub fn contains(&self, token: MilestoneToken) -> bool {
        self.tokens.contains(&token)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = MilestoneToken> + '_ {
        self.tokens.iter().copied()
    }
}

impl FromIterator<MilestoneToken> for UnlockedMilestones {
    fn from_iter<I: IntoIterator<Item = MilestoneToken>>(iter: I) -> Self {
        let mut set = Self::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}

impl<'de> Deserialize<'de> for UnlockedMilestones {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
        let mut set = Self::new();
        for value in raw {
            match MilestoneToken::deserialize(&value) {
                Ok(token) => {
                    if !set.insert(token) {
                        log::warn!("Collapsing duplicate milestone {token}");
                    }
                }
                Err(err) => log::warn!("Dropping unknown milestone {value}: {err}"),
            }
        }
        Ok(set)
    }
}

/// The first milestone in [`MILESTONE_PRIORITY`] that `progress` satisfies
/// and that has not been shown yet.
#[must_use]
pub fn next_eligible_milestone(
    progress: &LevelProgress,
    shown: &UnlockedMilestones,
) -> Option<MilestoneToken> {
    MILESTONE_PRIORITY
        .into_iter()
        .find(|token| !shown.contains(*token) && token.is_met(progress))
}
