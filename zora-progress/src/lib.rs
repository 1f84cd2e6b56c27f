//! Zora Progress Core
//!
//! Platform-agnostic progress, milestone and cloud-sync logic for the Zora
//! learning game. Star results are persisted with tamper-evident checksums,
//! milestone overlays are gated one at a time, and progress is mirrored to a
//! remote endpoint on a debounce. Storage and network access are injected
//! through [`KeyValueStore`] and [`RemoteTransport`].

pub mod chapters;
pub mod checksum;
pub mod config;
pub mod constants;
pub mod engine;
pub mod level;
pub mod milestone;
pub mod progress;
pub mod storage;
pub mod store;
pub mod sync;
pub mod title;
pub mod unlock;
pub mod version;

// Re-export commonly used types
pub use chapters::{CHAPTERS, Chapter, LevelStatus, chapter_for, level_status};
pub use checksum::{ChecksumGuard, Digest};
pub use config::{ConfigError, CoreConfig, SyncConfig};
pub use engine::{LevelOutcome, ProgressEngine, pull_from_cloud};
pub use level::{LevelId, ParseLevelError, SpecialStage, Stars};
pub use milestone::{
    MILESTONE_PRIORITY, MilestoneToken, StarThreshold, UnlockedMilestones, next_eligible_milestone,
};
pub use progress::LevelProgress;
pub use storage::{KeyValueStore, MemoryStore};
pub use store::{ProgressStore, ResetOutcome};
#[cfg(feature = "async")]
pub use sync::AutoSync;
pub use sync::{
    PendingPush, ProgressSnapshot, PushDebouncer, PushScheduler, PushTicket, RemoteTransport,
    SyncClient, SyncError, SyncId, SyncIdError, TransportError,
};
pub use title::{AvatarTier, TitleEntry, title_catalog};
pub use unlock::{
    CelebrationCue, Challenge, UnlockController, UnlockError, UnlockEvent, UnlockState,
};
pub use version::{RemoteVersion, record_app_version, update_available};
