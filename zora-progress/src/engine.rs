//! The progress facade the UI layer talks to.
//!
//! [`ProgressEngine`] owns the checksummed store, the unlock controller and
//! the cloud identity binding. Every mutation persists locally first, then
//! re-evaluates milestones, then hands a snapshot to the push scheduler.
use rand::Rng;
use std::cell::RefCell;

use crate::chapters::{LevelStatus, level_status};
use crate::config::CoreConfig;
use crate::level::{LevelId, Stars};
use crate::milestone::{MilestoneToken, UnlockedMilestones};
use crate::progress::LevelProgress;
use crate::storage::KeyValueStore;
use crate::store::{ProgressStore, ResetOutcome};
use crate::sync::{
    ProgressSnapshot, PushScheduler, RemoteTransport, SyncClient, SyncError, SyncId,
    clear_sync_id, load_sync_id, store_sync_id,
};
use crate::title::{AvatarTier, TitleEntry, title_catalog};
use crate::unlock::{Challenge, UnlockController, UnlockError, UnlockEvent, UnlockState};
use crate::version::record_app_version;

/// Result of [`ProgressEngine::record_level_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelOutcome {
    /// The best score for the level went up and was saved.
    pub improved: bool,
    /// Overlay to open, if this result made a milestone eligible.
    pub unlock: Option<UnlockEvent>,
}

pub struct ProgressEngine<S: KeyValueStore> {
    store: ProgressStore<S>,
    unlock: UnlockController,
    sync_id: Option<SyncId>,
    scheduler: Option<Box<dyn PushScheduler>>,
    app_version: String,
}

impl<S: KeyValueStore> ProgressEngine<S> {
    /// Load local progress and the bound sync code, if any.
    ///
    /// Milestones are not evaluated here; the UI calls
    /// [`Self::current_milestone_to_unlock`] once its first screen is up.
    pub fn load(storage: S, config: &CoreConfig) -> Self {
        let sync_id = load_sync_id(&storage);
        let store = ProgressStore::load(storage, config.checksum_guard());
        log::info!(
            "Loaded progress: {} stars, max level {}, sync {}",
            store.total_stars(),
            store.max_level(),
            sync_id.as_ref().map_or("off", SyncId::as_str)
        );
        Self {
            store,
            unlock: UnlockController::new(),
            sync_id,
            scheduler: None,
            app_version: config.app_version.clone(),
        }
    }

    /// Attach the driver that performs debounced cloud pushes.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Box<dyn PushScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn progress(&self) -> &LevelProgress {
        self.store.progress()
    }

    pub fn milestones(&self) -> &UnlockedMilestones {
        self.store.milestones()
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    /// Store the running version marker. Returns `true` on the first launch
    /// of a new version.
    pub fn record_app_version(&self) -> bool {
        record_app_version(self.store.storage(), &self.app_version)
    }

    /// Record a finished level. Invalid input is a logged no-op.
    pub fn record_level_result(&mut self, level: LevelId, stars: u8) -> LevelOutcome {
        let improved = self.store.record_level_result(level, stars);
        if !improved {
            return LevelOutcome {
                improved,
                unlock: None,
            };
        }
        log::debug!("Level {level} improved to {stars} stars");
        let unlock = self.refresh_unlocks();
        self.schedule_push();
        LevelOutcome { improved, unlock }
    }

    /// Re-run milestone evaluation. Yields an event only when a new overlay
    /// opens.
    pub fn refresh_unlocks(&mut self) -> Option<UnlockEvent> {
        self.unlock
            .refresh(self.store.progress(), self.store.milestones())
    }

    /// The milestone whose overlay is showing, evaluating first if none is.
    pub fn current_milestone_to_unlock(&mut self) -> Option<MilestoneToken> {
        self.refresh_unlocks();
        self.unlock.pending()
    }

    pub fn unlock_state(&self) -> UnlockState {
        self.unlock.state()
    }

    /// Close the overlay, record its milestone as shown and open the next
    /// one if another milestone is already eligible.
    ///
    /// # Errors
    ///
    /// Returns [`UnlockError::NothingPending`] when no overlay is open.
    pub fn continue_unlock(&mut self) -> Result<Option<UnlockEvent>, UnlockError> {
        let token = self.unlock.continue_unlock()?;
        self.mark_shown(token);
        Ok(self.refresh_unlocks())
    }

    /// Accept a special-stage challenge. The milestone is recorded as shown
    /// and the caller navigates to [`Challenge::level`].
    ///
    /// # Errors
    ///
    /// Fails without changing anything when nothing is pending or the pending
    /// milestone is not a special stage.
    pub fn challenge_unlock(&mut self) -> Result<Challenge, UnlockError> {
        let challenge = self.unlock.challenge_unlock()?;
        self.mark_shown(challenge.token);
        Ok(challenge)
    }

    pub fn total_stars(&self) -> u32 {
        self.store.total_stars()
    }

    pub fn max_level(&self) -> u16 {
        self.store.max_level()
    }

    pub fn stars_for(&self, level: LevelId) -> Stars {
        self.store.stars_for(level)
    }

    pub fn avatar_tier(&self) -> AvatarTier {
        AvatarTier::for_progress(self.store.progress())
    }

    pub fn title_catalog(&self) -> Vec<TitleEntry> {
        title_catalog(self.store.progress())
    }

    pub fn level_status(&self, level: LevelId) -> LevelStatus {
        level_status(self.store.progress(), level)
    }

    pub fn resume_level(&self) -> u16 {
        self.store.progress().resume_level()
    }

    /// Wipe local progress, milestones, the open overlay, any scheduled push
    /// and the local sync binding. The cloud copy is left alone.
    pub fn reset_progress(&mut self) -> ResetOutcome {
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel_pending();
        }
        self.unlock.clear();
        if self.sync_id.take().is_some() {
            clear_sync_id(self.store.storage());
        }
        self.store.reset()
    }

    pub fn sync_id(&self) -> Option<&SyncId> {
        self.sync_id.as_ref()
    }

    /// Bind a freshly drawn sync code and schedule the first push for it.
    pub fn generate_sync_id<R: Rng + ?Sized>(&mut self, rng: &mut R) -> SyncId {
        let id = SyncId::generate(rng);
        store_sync_id(self.store.storage(), &id);
        self.sync_id = Some(id.clone());
        log::info!("Generated sync code {id}");
        self.schedule_push();
        id
    }

    /// Current progress as it would be pushed.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.store.progress().clone(),
            milestones: self.store.milestones().clone(),
        }
    }

    /// Adopt a verified cloud copy: progress and milestones are replaced
    /// wholesale and `sync_id` becomes the bound code.
    pub fn import_cloud_snapshot(
        &mut self,
        sync_id: SyncId,
        snapshot: ProgressSnapshot,
    ) -> Option<UnlockEvent> {
        self.store.replace_all(snapshot.progress, snapshot.milestones);
        store_sync_id(self.store.storage(), &sync_id);
        log::info!("Imported cloud progress for {sync_id}");
        self.sync_id = Some(sync_id);
        self.schedule_push();
        self.unlock.clear();
        self.refresh_unlocks()
    }

    /// Three stars on levels 1 to 30.
    #[cfg(any(test, feature = "debug-tools"))]
    pub fn unlock_all_debug(&mut self) -> Option<UnlockEvent> {
        log::warn!("Debug unlock applied");
        self.store.unlock_all_debug();
        self.schedule_push();
        self.refresh_unlocks()
    }

    fn mark_shown(&mut self, token: MilestoneToken) {
        if self.store.mark_milestone_shown(token) {
            self.schedule_push();
        }
    }

    fn schedule_push(&self) {
        if let (Some(scheduler), Some(id)) = (&self.scheduler, &self.sync_id) {
            scheduler.schedule_push(self.snapshot(), id.clone());
        }
    }
}

/// Import the cloud copy for a user-entered sync code.
///
/// The code is validated before any request is made. No borrow of `engine`
/// is held while the request is in flight, and on any failure local state is
/// left exactly as it was.
///
/// # Errors
///
/// Returns [`SyncError::InvalidSyncId`] for a malformed code, or whatever
/// [`SyncClient::pull`] reports.
pub async fn pull_from_cloud<S, T>(
    engine: &RefCell<ProgressEngine<S>>,
    client: &SyncClient<T>,
    input: &str,
) -> Result<Option<UnlockEvent>, SyncError>
where
    S: KeyValueStore,
    T: RemoteTransport,
{
    let sync_id = SyncId::parse(input)?;
    let snapshot = client.pull(&sync_id).await?;
    Ok(engine.borrow_mut().import_cloud_snapshot(sync_id, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumGuard;
    use crate::constants::{KEY_LEVEL_PROGRESS, KEY_SYNC_ID, KEY_UNLOCKED_MILESTONES};
    use crate::level::SpecialStage;
    use crate::milestone::StarThreshold;
    use crate::storage::MemoryStore;
    use crate::sync::{PushDebouncer, PushTicket, TransportError};
    use crate::unlock::CelebrationCue;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use serde_json::json;
    use std::rc::Rc;
    use std::time::Duration;

    /// Debounce driver whose timers are fired by hand.
    struct ManualScheduler {
        debouncer: RefCell<PushDebouncer>,
        armed: RefCell<Vec<PushTicket>>,
        cancels: RefCell<u32>,
    }

    impl ManualScheduler {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                debouncer: RefCell::new(PushDebouncer::new(Duration::from_secs(2))),
                armed: RefCell::new(Vec::new()),
                cancels: RefCell::new(0),
            })
        }

        /// Let every armed timer elapse, returning what would be pushed.
        fn fire_all(&self) -> Vec<ProgressSnapshot> {
            let tickets: Vec<PushTicket> = self.armed.borrow_mut().drain(..).collect();
            tickets
                .into_iter()
                .filter_map(|ticket| self.debouncer.borrow_mut().take_due(ticket))
                .map(|push| push.snapshot)
                .collect()
        }
    }

    impl PushScheduler for ManualScheduler {
        fn schedule_push(&self, snapshot: ProgressSnapshot, sync_id: SyncId) {
            let ticket = self.debouncer.borrow_mut().schedule(snapshot, sync_id);
            self.armed.borrow_mut().push(ticket);
        }

        fn cancel_pending(&self) {
            *self.cancels.borrow_mut() += 1;
            self.debouncer.borrow_mut().cancel();
        }
    }

    fn engine_on(backend: &MemoryStore) -> ProgressEngine<MemoryStore> {
        ProgressEngine::load(backend.clone(), &CoreConfig::default())
    }

    #[test]
    fn milestones_surface_once_in_priority_order() {
        let backend = MemoryStore::new();
        let mut engine = engine_on(&backend);
        for level in 1..=7 {
            let outcome = engine.record_level_result(LevelId::Main(level), 2);
            assert!(outcome.improved);
            if level < 5 {
                assert!(outcome.unlock.is_none());
            }
        }
        // 14 stars: the 10-star title opened at level 5, S1 waits for level 8.
        assert_eq!(
            engine.current_milestone_to_unlock(),
            Some(MilestoneToken::Stars(StarThreshold::Adventurer))
        );
        let outcome = engine.record_level_result(LevelId::Main(8), 1);
        assert!(outcome.unlock.is_none());
        let next = engine.continue_unlock().unwrap().unwrap();
        assert_eq!(next.token, MilestoneToken::Special(SpecialStage::S1));
        assert_eq!(next.cue, CelebrationCue::SpecialUnlock);
        let challenge = engine.challenge_unlock().unwrap();
        assert_eq!(challenge.level, LevelId::Special(SpecialStage::S1));
        assert_eq!(engine.current_milestone_to_unlock(), None);
        assert_eq!(
            backend.get(KEY_UNLOCKED_MILESTONES).unwrap().as_deref(),
            Some(r#"[10,"S1"]"#)
        );
    }

    #[test]
    fn reset_clears_progress_overlay_and_binding() {
        let backend = MemoryStore::new();
        let scheduler = ManualScheduler::new();
        let mut engine = engine_on(&backend).with_scheduler(Box::new(Rc::clone(&scheduler)));
        for level in 1..=3 {
            engine.record_level_result(LevelId::Main(level), 3);
        }
        engine.generate_sync_id(&mut ChaCha20Rng::seed_from_u64(1));
        engine.unlock_all_debug();
        assert!(engine.unlock_state() != UnlockState::Idle);

        let outcome = engine.reset_progress();
        assert!(outcome.reload_required);
        assert_eq!(engine.total_stars(), 0);
        assert_eq!(engine.max_level(), 1);
        assert_eq!(engine.unlock_state(), UnlockState::Idle);
        assert!(engine.sync_id().is_none());
        assert!(!backend.contains(KEY_LEVEL_PROGRESS));
        assert!(!backend.contains(KEY_SYNC_ID));
        assert_eq!(*scheduler.cancels.borrow(), 1);
        assert!(scheduler.fire_all().is_empty());

        let reloaded = engine_on(&backend);
        assert!(reloaded.progress().is_empty());
        assert!(reloaded.milestones().is_empty());
    }

    #[test]
    fn burst_of_changes_pushes_final_state_once() {
        let backend = MemoryStore::new();
        let scheduler = ManualScheduler::new();
        let mut engine = engine_on(&backend).with_scheduler(Box::new(Rc::clone(&scheduler)));
        engine.record_level_result(LevelId::Main(1), 1);
        assert!(scheduler.fire_all().is_empty(), "unbound engines never push");

        engine.generate_sync_id(&mut ChaCha20Rng::seed_from_u64(9));
        engine.record_level_result(LevelId::Main(1), 2);
        engine.record_level_result(LevelId::Main(2), 3);
        engine.record_level_result(LevelId::Main(3), 1);
        let pushed = scheduler.fire_all();
        assert_eq!(pushed, vec![engine.snapshot()]);
        assert_eq!(pushed[0].progress.total_stars(), 6);
    }

    #[test]
    fn rejected_results_do_not_schedule() {
        let backend = MemoryStore::new();
        let scheduler = ManualScheduler::new();
        let mut engine = engine_on(&backend).with_scheduler(Box::new(Rc::clone(&scheduler)));
        engine.generate_sync_id(&mut ChaCha20Rng::seed_from_u64(3));
        scheduler.fire_all();
        engine.record_level_result(LevelId::Main(1), 3);
        scheduler.fire_all();

        let outcome = engine.record_level_result(LevelId::Main(1), 2);
        assert!(!outcome.improved);
        assert!(!engine.record_level_result(LevelId::Main(2), 7).improved);
        assert!(scheduler.fire_all().is_empty());
    }

    #[test]
    fn sync_binding_survives_reload() {
        let backend = MemoryStore::new();
        let mut engine = engine_on(&backend);
        let id = engine.generate_sync_id(&mut ChaCha20Rng::seed_from_u64(5));
        assert_eq!(engine_on(&backend).sync_id(), Some(&id));
    }

    struct FixedReply(serde_json::Value);

    #[async_trait(?Send)]
    impl RemoteTransport for FixedReply {
        async fn post_json(&self, _body: &serde_json::Value) -> Result<(), TransportError> {
            Ok(())
        }

        async fn get_json(
            &self,
            _query: &[(&str, &str)],
        ) -> Result<serde_json::Value, TransportError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn cloud_import_replaces_local_state_and_binds_code() {
        let remote_progress: LevelProgress = (1..=8)
            .map(|n| (LevelId::Main(n), Stars::MAX))
            .collect();
        let checksum = ChecksumGuard::default().compute(&remote_progress).unwrap();
        let client = SyncClient::new(
            FixedReply(json!({
                "status": "success",
                "progress": serde_json::to_string(&remote_progress).unwrap(),
                "milestones": "[\"S1\"]",
                "checksum": checksum.as_str(),
            })),
            ChecksumGuard::default(),
        );
        let backend = MemoryStore::new();
        let engine = RefCell::new(engine_on(&backend));
        engine.borrow_mut().record_level_result(LevelId::Main(1), 1);

        let event = block_on(pull_from_cloud(&engine, &client, " zora-ab23 ")).unwrap();
        assert_eq!(
            event.map(|e| e.token),
            Some(MilestoneToken::Stars(StarThreshold::Adventurer))
        );
        let engine = engine.borrow();
        assert_eq!(engine.total_stars(), 24);
        assert_eq!(engine.sync_id().map(SyncId::as_str), Some("ZORA-AB23"));
        assert_eq!(engine_on(&backend).progress(), &remote_progress);
    }

    #[test]
    fn failed_import_leaves_local_state_untouched() {
        let client = SyncClient::new(
            FixedReply(json!({
                "status": "success",
                "progress": "{\"1\":3}",
                "milestones": "[]",
                "checksum": "bogus",
            })),
            ChecksumGuard::default(),
        );
        let backend = MemoryStore::new();
        let engine = RefCell::new(engine_on(&backend));
        engine.borrow_mut().record_level_result(LevelId::Main(2), 2);
        let before = backend.snapshot();

        let err = block_on(pull_from_cloud(&engine, &client, "ZORA-AB23")).unwrap_err();
        assert!(matches!(err, SyncError::IntegrityFailed));
        let err = block_on(pull_from_cloud(&engine, &client, "nope")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidSyncId(_)));

        assert_eq!(backend.snapshot(), before);
        assert!(engine.borrow().sync_id().is_none());
    }

    #[test]
    fn import_drops_overlay_the_cloud_copy_does_not_earn() {
        let backend = MemoryStore::new();
        let mut engine = engine_on(&backend);
        for level in 1..=4 {
            engine.record_level_result(LevelId::Main(level), 3);
        }
        let adventurer = MilestoneToken::Stars(StarThreshold::Adventurer);
        assert_eq!(engine.current_milestone_to_unlock(), Some(adventurer));

        let remote: LevelProgress = [(LevelId::Main(1), Stars::MAX)].into_iter().collect();
        let event = engine.import_cloud_snapshot(
            SyncId::parse("ZORA-AB23").unwrap(),
            ProgressSnapshot {
                progress: remote,
                milestones: UnlockedMilestones::new(),
            },
        );
        assert!(event.is_none());
        assert_eq!(engine.total_stars(), 3);
        assert_eq!(engine.current_milestone_to_unlock(), None);
        assert!(matches!(
            engine.continue_unlock(),
            Err(UnlockError::NothingPending)
        ));
        assert!(!engine.milestones().contains(adventurer));

        for level in 2..=4 {
            engine.record_level_result(LevelId::Main(level), 3);
        }
        assert_eq!(engine.current_milestone_to_unlock(), Some(adventurer));
    }

    #[test]
    fn projections_follow_progress() {
        let backend = MemoryStore::new();
        let mut engine = engine_on(&backend);
        assert_eq!(engine.avatar_tier(), AvatarTier::Apprentice);
        assert_eq!(engine.resume_level(), 1);
        for level in 1..=4 {
            engine.record_level_result(LevelId::Main(level), 3);
        }
        assert_eq!(engine.avatar_tier(), AvatarTier::Adventurer);
        assert_eq!(engine.resume_level(), 4);
        assert_eq!(engine.level_status(LevelId::Main(5)), LevelStatus::Open);
        assert_eq!(engine.level_status(LevelId::Main(6)), LevelStatus::Locked);
        let unlocked = engine.title_catalog().iter().filter(|t| t.unlocked).count();
        assert_eq!(unlocked, 2);
    }
}
