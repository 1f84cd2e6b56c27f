//! Level identifiers and star ratings.
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::{MAX_STARS, S1_GATE_LEVEL, S2_GATE_LEVEL, S3_GATE_LEVEL};

/// Bonus review stages unlocked at the end of the first three chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecialStage {
    S1,
    S2,
    S3,
}

impl SpecialStage {
    pub const ALL: [Self; 3] = [Self::S1, Self::S2, Self::S3];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S1 => "S1",
            Self::S2 => "S2",
            Self::S3 => "S3",
        }
    }

    /// The `maxLevel` a player must reach before this stage opens.
    #[must_use]
    pub const fn gate_level(self) -> u16 {
        match self {
            Self::S1 => S1_GATE_LEVEL,
            Self::S2 => S2_GATE_LEVEL,
            Self::S3 => S3_GATE_LEVEL,
        }
    }

    /// The main level whose completion opens this stage (L7, L14, L21).
    #[must_use]
    pub const fn trigger_level(self) -> u16 {
        self.gate_level() - 1
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "S1" => Some(Self::S1),
            "S2" => Some(Self::S2),
            "S3" => Some(Self::S3),
            _ => None,
        }
    }
}

impl fmt::Display for SpecialStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playable unit: a numbered level or one of the special stages.
///
/// The derived ordering places every numbered level (ascending) before the
/// special stages, which is also the key order of the persisted JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LevelId {
    Main(u16),
    Special(SpecialStage),
}

impl LevelId {
    /// Build a numbered level id. Level numbers start at 1.
    #[must_use]
    pub const fn main(number: u16) -> Option<Self> {
        if number == 0 {
            None
        } else {
            Some(Self::Main(number))
        }
    }

    #[must_use]
    pub const fn number(self) -> Option<u16> {
        match self {
            Self::Main(n) => Some(n),
            Self::Special(_) => None,
        }
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        match self {
            Self::Main(n) => n > 0,
            Self::Special(_) => true,
        }
    }
}

impl From<SpecialStage> for LevelId {
    fn from(stage: SpecialStage) -> Self {
        Self::Special(stage)
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main(n) => write!(f, "{n}"),
            Self::Special(stage) => f.write_str(stage.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseLevelError {
    #[error("empty level id")]
    Empty,
    #[error("level numbers start at 1")]
    Zero,
    #[error("unrecognized level id `{0}`")]
    Unknown(String),
}

impl FromStr for LevelId {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ParseLevelError::Empty);
        }
        if let Some(stage) = SpecialStage::parse(raw) {
            return Ok(Self::Special(stage));
        }
        let number: u16 = raw
            .parse()
            .map_err(|_| ParseLevelError::Unknown(raw.to_string()))?;
        Self::main(number).ok_or(ParseLevelError::Zero)
    }
}

impl Serialize for LevelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct LevelIdVisitor;

impl Visitor<'_> for LevelIdVisitor {
    type Value = LevelId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a positive level number or one of S1, S2, S3")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        u16::try_from(v)
            .ok()
            .and_then(LevelId::main)
            .ok_or_else(|| E::custom(ParseLevelError::Unknown(v.to_string())))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map_err(|_| E::custom(ParseLevelError::Unknown(v.to_string())))
            .and_then(|v| self.visit_u64(v))
    }
}

impl<'de> Deserialize<'de> for LevelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LevelIdVisitor)
    }
}

/// Star rating for a level, always within `0..=3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stars(u8);

impl Stars {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(MAX_STARS);

    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value <= MAX_STARS {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Stars awarded for a completed level: `1..=3`.
    #[must_use]
    pub const fn earned(value: u8) -> Option<Self> {
        if value >= 1 && value <= MAX_STARS {
            Some(Self(value))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_perfect(self) -> bool {
        self.0 == MAX_STARS
    }
}

impl TryFrom<u8> for Stars {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("stars must be 0..=3 (got {value})"))
    }
}

impl From<Stars> for u8 {
    fn from(stars: Stars) -> Self {
        stars.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_and_special_stages() {
        assert_eq!("7".parse::<LevelId>(), Ok(LevelId::Main(7)));
        assert_eq!(" S2 ".parse::<LevelId>(), Ok(LevelId::Special(SpecialStage::S2)));
        assert_eq!("0".parse::<LevelId>(), Err(ParseLevelError::Zero));
        assert!(matches!("S9".parse::<LevelId>(), Err(ParseLevelError::Unknown(_))));
        assert_eq!("".parse::<LevelId>(), Err(ParseLevelError::Empty));
    }

    #[test]
    fn numbered_levels_sort_before_special_stages() {
        let mut ids = vec![
            LevelId::Special(SpecialStage::S1),
            LevelId::Main(29),
            LevelId::Main(3),
            LevelId::Special(SpecialStage::S3),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                LevelId::Main(3),
                LevelId::Main(29),
                LevelId::Special(SpecialStage::S1),
                LevelId::Special(SpecialStage::S3),
            ]
        );
    }

    #[test]
    fn level_ids_accept_json_strings_and_numbers() {
        let from_str: LevelId = serde_json::from_str("\"12\"").unwrap();
        let from_num: LevelId = serde_json::from_str("12").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(serde_json::to_string(&LevelId::Special(SpecialStage::S1)).unwrap(), "\"S1\"");
    }

    #[test]
    fn stars_reject_out_of_range_values() {
        assert_eq!(Stars::new(3), Some(Stars::MAX));
        assert_eq!(Stars::new(4), None);
        assert_eq!(Stars::earned(0), None);
        assert!(serde_json::from_str::<Stars>("5").is_err());
        assert_eq!(SpecialStage::S2.trigger_level(), 14);
    }
}
