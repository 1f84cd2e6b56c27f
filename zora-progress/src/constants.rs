//! Centralized thresholds, storage keys and protocol constants for the
//! progress core.
//!
//! Unlock thresholds are part of the game's design and change only through
//! reviewed code, never through external JSON assets.

// Storage keys -------------------------------------------------------------
pub const KEY_LEVEL_PROGRESS: &str = "game_level_progress";
pub const KEY_LEVEL_PROGRESS_CHECKSUM: &str = "game_level_progress_checksum";
pub const KEY_UNLOCKED_MILESTONES: &str = "game_unlocked_milestones";
pub const KEY_UNLOCKED_MILESTONES_CHECKSUM: &str = "game_unlocked_milestones_checksum";
pub const KEY_SYNC_ID: &str = "game_sync_id";
pub const KEY_APP_VERSION: &str = "app_version";

// Integrity ----------------------------------------------------------------
pub const DEFAULT_CHECKSUM_SALT: &str = "zora_city_secret_2025";

// Level layout -------------------------------------------------------------
/// Last level of the main campaign that counts towards the perfect title.
pub const LAST_MAIN_LEVEL: u16 = 28;
/// The boss stage that unlocks the god title.
pub const BOSS_LEVEL: u16 = 29;
/// Highest level touched by the debug unlock.
pub const DEBUG_UNLOCK_LAST_LEVEL: u16 = 30;
pub const MAX_STARS: u8 = 3;

// Star thresholds ----------------------------------------------------------
pub const STARS_ADVENTURER: u32 = 10;
pub const STARS_KNIGHT: u32 = 25;
pub const STARS_WIZARD: u32 = 40;
pub const STARS_DRAGON_HERO: u32 = 55;

// Special stage gates (maxLevel required) -----------------------------------
pub const S1_GATE_LEVEL: u16 = 8;
pub const S2_GATE_LEVEL: u16 = 15;
pub const S3_GATE_LEVEL: u16 = 22;

// Cloud sync ---------------------------------------------------------------
pub const SYNC_ID_PREFIX: &str = "ZORA-";
pub const SYNC_ID_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const SYNC_ID_SUFFIX_LEN: usize = 4;
pub const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 2_000;
pub const ACTION_SAVE_PROGRESS: &str = "save_progress";
pub const ACTION_LOAD_PROGRESS: &str = "load_progress";
pub const STATUS_SUCCESS: &str = "success";

// Versioning ---------------------------------------------------------------
pub const DEFAULT_APP_VERSION: &str = "1.2.9";
