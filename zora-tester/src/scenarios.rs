//! Scripted playthroughs driven against the in-memory store and endpoint.
//!
//! Every scenario is deterministic for a given seed. Async scenarios spawn
//! local tasks and must run inside a `tokio::task::LocalSet`.
use anyhow::{Context, Result, bail, ensure};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use zora_progress::constants::{
    BOSS_LEVEL, DEFAULT_APP_VERSION, KEY_LEVEL_PROGRESS, KEY_LEVEL_PROGRESS_CHECKSUM,
    LAST_MAIN_LEVEL,
};
use zora_progress::{
    AutoSync, AvatarTier, ChecksumGuard, CoreConfig, KeyValueStore, LevelId, LevelProgress,
    LevelStatus, MILESTONE_PRIORITY, MemoryStore, MilestoneToken, ProgressEngine, SyncClient,
    Stars, SyncError, next_eligible_milestone, pull_from_cloud, update_available,
};

use crate::remote::MockRemote;

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    FirstRun,
    Campaign,
    Reset,
    Tamper,
    CloudRoundtrip,
    Debounce,
}

impl Scenario {
    pub const ALL: [Self; 6] = [
        Self::FirstRun,
        Self::Campaign,
        Self::Reset,
        Self::Tamper,
        Self::CloudRoundtrip,
        Self::Debounce,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::FirstRun => "first-run",
            Self::Campaign => "campaign",
            Self::Reset => "reset",
            Self::Tamper => "tamper",
            Self::CloudRoundtrip => "cloud-roundtrip",
            Self::Debounce => "debounce",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::FirstRun => "Empty install: no stars, level 1 open, nothing to celebrate",
            Self::Campaign => "Random replays through the boss; every milestone exactly once",
            Self::Reset => "Reset wipes progress, milestones and the sync binding",
            Self::Tamper => "Corrupted local records load fail-open",
            Self::CloudRoundtrip => "Push, pull on a second device, integrity and offline paths",
            Self::Debounce => "A burst of results produces one push of the final state",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    /// Run one iteration with `seed`.
    ///
    /// # Errors
    ///
    /// Returns the first failed expectation.
    pub async fn run(self, seed: u64) -> Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        match self {
            Self::FirstRun => first_run(),
            Self::Campaign => campaign(&mut rng),
            Self::Reset => reset(&mut rng),
            Self::Tamper => tamper(&mut rng),
            Self::CloudRoundtrip => cloud_roundtrip(&mut rng).await,
            Self::Debounce => debounce(&mut rng).await,
        }
    }
}

fn fresh_engine(store: &MemoryStore) -> ProgressEngine<MemoryStore> {
    ProgressEngine::load(store.clone(), &CoreConfig::default())
}

/// Dismiss overlays until none is eligible, checking each against the
/// evaluator before it is recorded.
fn drain_unlocks(engine: &mut ProgressEngine<MemoryStore>) -> Result<Vec<MilestoneToken>> {
    let mut shown = Vec::new();
    let mut current = engine.current_milestone_to_unlock();
    while let Some(token) = current {
        let expected = next_eligible_milestone(engine.progress(), engine.milestones());
        ensure!(
            expected == Some(token),
            "overlay shows {token} but the evaluator picks {expected:?}"
        );
        shown.push(token);
        current = engine.continue_unlock()?.map(|event| event.token);
    }
    Ok(shown)
}

/// Play `count` random results on levels `1..=last`.
fn play_random(
    engine: &mut ProgressEngine<MemoryStore>,
    rng: &mut ChaCha20Rng,
    count: usize,
    last: u16,
) -> Result<()> {
    for _ in 0..count {
        let level = LevelId::Main(rng.gen_range(1..=last));
        engine.record_level_result(level, rng.gen_range(1..=3));
        drain_unlocks(engine)?;
    }
    Ok(())
}

fn first_run() -> Result<()> {
    let store = MemoryStore::new();
    let mut engine = fresh_engine(&store);
    ensure!(engine.total_stars() == 0, "fresh install has stars");
    ensure!(engine.max_level() == 1, "fresh install max level {}", engine.max_level());
    ensure!(engine.resume_level() == 1, "fresh install resumes past level 1");
    ensure!(engine.avatar_tier() == AvatarTier::Apprentice, "fresh install is ranked");
    ensure!(
        engine.current_milestone_to_unlock().is_none(),
        "fresh install has a milestone"
    );
    ensure!(engine.level_status(LevelId::Main(1)) == LevelStatus::Open, "level 1 locked");
    ensure!(
        engine.level_status(LevelId::Main(2)) == LevelStatus::Locked,
        "level 2 open on first run"
    );
    ensure!(store.snapshot().is_empty(), "loading wrote to storage");
    Ok(())
}

fn campaign(rng: &mut ChaCha20Rng) -> Result<()> {
    let store = MemoryStore::new();
    let mut engine = fresh_engine(&store);
    let mut best: BTreeMap<u16, u8> = BTreeMap::new();
    let mut shown = Vec::new();

    for level in 1..=LAST_MAIN_LEVEL {
        for _ in 0..rng.gen_range(1..=3) {
            let stars = rng.gen_range(1..=3u8);
            let previous = best.get(&level).copied().unwrap_or(0);
            let outcome = engine.record_level_result(LevelId::Main(level), stars);
            ensure!(
                outcome.improved == (stars > previous),
                "level {level}: {stars} over {previous} reported improved={}",
                outcome.improved
            );
            let kept = engine.stars_for(LevelId::Main(level)).get();
            ensure!(kept == previous.max(stars), "level {level} kept {kept} stars");
            best.insert(level, kept);
            shown.extend(drain_unlocks(&mut engine)?);
        }
    }
    let sum: u32 = best.values().map(|s| u32::from(*s)).sum();
    ensure!(engine.total_stars() == sum, "total {} != {sum}", engine.total_stars());

    for level in 1..=LAST_MAIN_LEVEL {
        engine.record_level_result(LevelId::Main(level), 3);
        shown.extend(drain_unlocks(&mut engine)?);
    }
    engine.record_level_result(LevelId::Main(BOSS_LEVEL), rng.gen_range(1..=3));
    shown.extend(drain_unlocks(&mut engine)?);

    ensure!(
        shown.len() == MILESTONE_PRIORITY.len(),
        "expected {} milestones, saw {shown:?}",
        MILESTONE_PRIORITY.len()
    );
    for token in MILESTONE_PRIORITY {
        ensure!(shown.contains(&token), "milestone {token} never shown");
    }
    ensure!(engine.avatar_tier() == AvatarTier::GodDomain, "boss clear is not god tier");

    let reloaded = fresh_engine(&store);
    ensure!(reloaded.progress() == engine.progress(), "reload changed progress");
    ensure!(reloaded.milestones() == engine.milestones(), "reload changed milestones");
    Ok(())
}

fn reset(rng: &mut ChaCha20Rng) -> Result<()> {
    let store = MemoryStore::new();
    let mut engine = fresh_engine(&store);
    let plays = rng.gen_range(5..=40);
    play_random(&mut engine, rng, plays, LAST_MAIN_LEVEL)?;
    engine.generate_sync_id(rng);

    ensure!(engine.reset_progress().reload_required, "reset did not ask for reload");
    ensure!(store.snapshot().is_empty(), "reset left keys: {:?}", store.snapshot());

    let mut engine = fresh_engine(&store);
    ensure!(engine.total_stars() == 0, "stars survived reset");
    ensure!(engine.max_level() == 1, "max level survived reset");
    ensure!(engine.milestones().is_empty(), "milestones survived reset");
    ensure!(engine.sync_id().is_none(), "sync code survived reset");
    let outcome = engine.record_level_result(LevelId::Main(1), 3);
    ensure!(outcome.unlock.is_none(), "3 stars unlocked {:?}", outcome.unlock);
    ensure!(
        engine.current_milestone_to_unlock().is_none(),
        "milestone pending after reset"
    );
    Ok(())
}

fn tamper(rng: &mut ChaCha20Rng) -> Result<()> {
    let store = MemoryStore::new();
    let mut engine = fresh_engine(&store);
    let plays = rng.gen_range(3..=30);
    play_random(&mut engine, rng, plays, 20)?;
    let expected = engine.progress().clone();
    let milestones = engine.milestones().clone();

    store.set(KEY_LEVEL_PROGRESS_CHECKSUM, "-1")?;
    ensure!(
        fresh_engine(&store).progress() == &expected,
        "checksum mismatch did not fail open"
    );

    let raw = store
        .get(KEY_LEVEL_PROGRESS)?
        .context("progress record missing")?;
    let mut entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)?;
    entries.insert("0".into(), 3.into());
    entries.insert("S9".into(), 1.into());
    entries.insert("99".into(), rng.gen_range(4..=9u8).into());
    entries.insert("junk".into(), "three".into());
    store.set(KEY_LEVEL_PROGRESS, &serde_json::to_string(&entries)?)?;
    let reloaded = fresh_engine(&store);
    ensure!(
        reloaded.progress() == &expected,
        "invalid entries were not dropped: {:?}",
        reloaded.progress()
    );

    store.set(KEY_LEVEL_PROGRESS, "{not json")?;
    let reloaded = fresh_engine(&store);
    ensure!(reloaded.progress().is_empty(), "malformed progress was not reset");
    ensure!(
        reloaded.milestones() == &milestones,
        "milestones lost with the progress record"
    );
    Ok(())
}

async fn cloud_roundtrip(rng: &mut ChaCha20Rng) -> Result<()> {
    let remote = Rc::new(MockRemote::new());
    let client = SyncClient::new(Rc::clone(&remote), ChecksumGuard::default());

    let phone_store = MemoryStore::new();
    let mut phone = fresh_engine(&phone_store);
    let plays = rng.gen_range(5..=40);
    play_random(&mut phone, rng, plays, 20)?;
    let id = phone.generate_sync_id(rng);
    ensure!(client.push(&phone.snapshot(), &id).await, "push was not sent");
    ensure!(client.last_synced().is_some(), "push time not recorded");

    let tablet_store = MemoryStore::new();
    let tablet = RefCell::new(fresh_engine(&tablet_store));
    let typed = format!("  {}  ", id.as_str().to_lowercase());
    pull_from_cloud(&tablet, &client, &typed).await?;
    {
        let tablet = tablet.borrow();
        ensure!(tablet.progress() == phone.progress(), "pulled progress differs");
        ensure!(tablet.milestones() == phone.milestones(), "pulled milestones differ");
        ensure!(tablet.sync_id() == Some(&id), "pulled code not bound");
    }

    let unknown = if id.as_str() == "ZORA-2222" { "ZORA-3333" } else { "ZORA-2222" };
    match pull_from_cloud(&tablet, &client, unknown).await {
        Err(err @ SyncError::Remote { .. }) => {
            ensure!(err.user_message() == "Sync ID not found", "unexpected message {err}");
        }
        other => bail!("unknown code returned {other:?}"),
    }

    let mut tampered: LevelProgress = phone.progress().clone();
    tampered.record(LevelId::Main(BOSS_LEVEL), Stars::MAX);
    ensure!(
        remote.corrupt_progress(id.as_str(), &serde_json::to_string(&tampered)?),
        "row missing on the remote"
    );
    let before = tablet_store.snapshot();
    match pull_from_cloud(&tablet, &client, id.as_str()).await {
        Err(SyncError::IntegrityFailed) => {}
        other => bail!("tampered row returned {other:?}"),
    }
    ensure!(tablet_store.snapshot() == before, "failed import touched storage");

    remote.set_offline(true);
    ensure!(!client.push(&phone.snapshot(), &id).await, "offline push reported sent");
    match pull_from_cloud(&tablet, &client, id.as_str()).await {
        Err(err @ SyncError::Transport(_)) => {
            ensure!(err.user_message() == "Connection Error", "unexpected message {err}");
        }
        other => bail!("offline pull returned {other:?}"),
    }

    remote.set_offline(false);
    remote.set_version("9.9.9");
    let advertised = client.fetch_remote_version().await;
    ensure!(
        update_available(DEFAULT_APP_VERSION, advertised.as_ref()),
        "newer remote version not detected"
    );
    Ok(())
}

async fn debounce(rng: &mut ChaCha20Rng) -> Result<()> {
    let remote = Rc::new(MockRemote::new());
    let client = Rc::new(SyncClient::new(Rc::clone(&remote), ChecksumGuard::default()));
    let auto = Rc::new(AutoSync::new(client, DEBOUNCE_WINDOW));
    let store = MemoryStore::new();
    let mut engine = fresh_engine(&store).with_scheduler(Box::new(Rc::clone(&auto)));
    let id = engine.generate_sync_id(rng);

    for level in 1..=3 {
        engine.record_level_result(LevelId::Main(level), rng.gen_range(1..=3));
        tokio::time::sleep(DEBOUNCE_WINDOW / 10).await;
    }
    ensure!(remote.push_count() == 0, "pushed before the quiet period");
    tokio::time::sleep(DEBOUNCE_WINDOW * 4).await;
    ensure!(remote.push_count() == 1, "expected one push, saw {}", remote.push_count());
    let row = remote.row(id.as_str()).context("no row for the sync code")?;
    let pushed: LevelProgress = serde_json::from_str(&row.progress)?;
    ensure!(&pushed == engine.progress(), "push did not carry the final state");

    engine.record_level_result(LevelId::Main(4), 3);
    ensure!(auto.is_pending(), "change did not schedule a push");
    engine.reset_progress();
    tokio::time::sleep(DEBOUNCE_WINDOW * 4).await;
    ensure!(remote.push_count() == 1, "reset did not cancel the scheduled push");
    Ok(())
}
