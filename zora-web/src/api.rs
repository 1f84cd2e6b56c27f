//! JavaScript entry points.
//!
//! [`ZoraProgress`] wraps one [`ProgressEngine`] on `localStorage`. Values
//! cross the boundary as plain JS objects; level ids may be passed as numbers
//! (`5`) or strings (`"5"`, `"S1"`).
use chrono::SecondsFormat;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use zora_progress::{
    AvatarTier, CelebrationCue, CoreConfig, LevelId, LevelOutcome, MilestoneToken,
    ProgressEngine, SyncClient, UnlockEvent, pull_from_cloud, update_available,
};

use crate::auto_sync::WebAutoSync;
use crate::storage::{WebStorage, clear_session_flags};
use crate::transport::FetchTransport;

const EMBEDDED_CONFIG: &str = include_str!("../static/config/zora.json");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnlockView {
    token: MilestoneToken,
    cue: CelebrationCue,
}

impl From<UnlockEvent> for UnlockView {
    fn from(event: UnlockEvent) -> Self {
        Self {
            token: event.token,
            cue: event.cue,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeView {
    improved: bool,
    unlock: Option<UnlockView>,
}

impl From<LevelOutcome> for OutcomeView {
    fn from(outcome: LevelOutcome) -> Self {
        Self {
            improved: outcome.improved,
            unlock: outcome.unlock.map(UnlockView::from),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TierView {
    rank: u8,
    title_key: &'static str,
    sprite: String,
}

impl From<AvatarTier> for TierView {
    fn from(tier: AvatarTier) -> Self {
        Self {
            rank: tier.rank(),
            title_key: tier.title_key(),
            sprite: tier.sprite(),
        }
    }
}

/// Shape expected by the sync code dialog.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportResult {
    success: bool,
    error: Option<String>,
    unlock: Option<UnlockView>,
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(Into::into)
}

fn level_from_js(value: &JsValue) -> Result<LevelId, JsValue> {
    let raw = value
        .as_f64()
        .map(|n| n.to_string())
        .or_else(|| value.as_string())
        .ok_or_else(|| JsValue::from_str("level must be a number or string"))?;
    raw.parse()
        .map_err(|err| JsValue::from_str(&format!("invalid level `{raw}`: {err}")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn entropy_seed() -> u64 {
    let random = (js_sys::Math::random() * 9_007_199_254_740_992.0) as u64;
    random ^ (js_sys::Date::now() as u64)
}

#[wasm_bindgen]
pub struct ZoraProgress {
    engine: Rc<RefCell<ProgressEngine<WebStorage>>>,
    client: Option<Rc<SyncClient<FetchTransport>>>,
    rng: RefCell<ChaCha20Rng>,
}

#[wasm_bindgen]
impl ZoraProgress {
    /// Open progress with the bundled configuration.
    ///
    /// # Errors
    /// Returns an error when `localStorage` is unavailable.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Self, JsValue> {
        Self::with_config(EMBEDDED_CONFIG)
    }

    /// Open progress with a caller-supplied configuration JSON.
    ///
    /// # Errors
    /// Returns an error for invalid configuration or missing `localStorage`.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(json: &str) -> Result<Self, JsValue> {
        let config = CoreConfig::from_json(json).map_err(|err| JsValue::from_str(&err.to_string()))?;
        let storage = WebStorage::local().map_err(|err| JsValue::from_str(&err.to_string()))?;
        let client = config.sync.endpoint_url.as_ref().map(|url| {
            Rc::new(SyncClient::new(
                FetchTransport::new(url.clone()),
                config.checksum_guard(),
            ))
        });
        let mut engine = ProgressEngine::load(storage, &config);
        if let Some(client) = &client {
            engine = engine.with_scheduler(Box::new(WebAutoSync::new(
                Rc::clone(client),
                config.debounce_window(),
            )));
        }
        if engine.record_app_version() {
            log::info!("Running version {}", engine.app_version());
        }
        Ok(Self {
            engine: Rc::new(RefCell::new(engine)),
            client,
            rng: RefCell::new(ChaCha20Rng::seed_from_u64(entropy_seed())),
        })
    }

    /// Record a finished level. Returns `{improved, unlock?}`.
    ///
    /// # Errors
    /// Returns an error when `level` is not a level id.
    #[wasm_bindgen(js_name = recordLevelResult)]
    pub fn record_level_result(&self, level: &JsValue, stars: u8) -> Result<JsValue, JsValue> {
        let level = level_from_js(level)?;
        let outcome = self.engine.borrow_mut().record_level_result(level, stars);
        to_js(&OutcomeView::from(outcome))
    }

    /// Token of the overlay to show, or `undefined`.
    ///
    /// # Errors
    /// Returns an error if the token cannot be converted.
    #[wasm_bindgen(js_name = currentMilestoneToUnlock)]
    pub fn current_milestone_to_unlock(&self) -> Result<JsValue, JsValue> {
        let token = self.engine.borrow_mut().current_milestone_to_unlock();
        to_js(&token)
    }

    /// Close the overlay. Returns the next `{token, cue}` if one opens.
    ///
    /// # Errors
    /// Returns an error when no overlay is open.
    #[wasm_bindgen(js_name = continueUnlock)]
    pub fn continue_unlock(&self) -> Result<JsValue, JsValue> {
        let next = self
            .engine
            .borrow_mut()
            .continue_unlock()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        to_js(&next.map(UnlockView::from))
    }

    /// Accept a special-stage challenge. Returns the level id to open.
    ///
    /// # Errors
    /// Returns an error when the open overlay is not a special stage.
    #[wasm_bindgen(js_name = challengeUnlock)]
    pub fn challenge_unlock(&self) -> Result<String, JsValue> {
        let challenge = self
            .engine
            .borrow_mut()
            .challenge_unlock()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(challenge.level.to_string())
    }

    #[wasm_bindgen(js_name = totalStars)]
    pub fn total_stars(&self) -> u32 {
        self.engine.borrow().total_stars()
    }

    #[wasm_bindgen(js_name = maxLevel)]
    pub fn max_level(&self) -> u16 {
        self.engine.borrow().max_level()
    }

    /// # Errors
    /// Returns an error when `level` is not a level id.
    #[wasm_bindgen(js_name = starsFor)]
    pub fn stars_for(&self, level: &JsValue) -> Result<u8, JsValue> {
        let level = level_from_js(level)?;
        Ok(self.engine.borrow().stars_for(level).get())
    }

    /// `{rank, titleKey, sprite}` of the current rank.
    ///
    /// # Errors
    /// Returns an error if the value cannot be converted.
    #[wasm_bindgen(js_name = avatarTier)]
    pub fn avatar_tier(&self) -> Result<JsValue, JsValue> {
        to_js(&TierView::from(self.engine.borrow().avatar_tier()))
    }

    /// # Errors
    /// Returns an error if the value cannot be converted.
    #[wasm_bindgen(js_name = titleCatalog)]
    pub fn title_catalog(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.borrow().title_catalog())
    }

    /// `{state: "locked" | "open" | "completed", stars?}` for a map node.
    ///
    /// # Errors
    /// Returns an error when `level` is not a level id.
    #[wasm_bindgen(js_name = levelStatus)]
    pub fn level_status(&self, level: &JsValue) -> Result<JsValue, JsValue> {
        let level = level_from_js(level)?;
        to_js(&self.engine.borrow().level_status(level))
    }

    #[wasm_bindgen(js_name = resumeLevel)]
    pub fn resume_level(&self) -> u16 {
        self.engine.borrow().resume_level()
    }

    /// Wipe local progress. Returns `true` when the page must reload.
    #[wasm_bindgen(js_name = resetProgress)]
    pub fn reset_progress(&self) -> bool {
        let outcome = self.engine.borrow_mut().reset_progress();
        clear_session_flags();
        outcome.reload_required
    }

    #[wasm_bindgen(js_name = generateSyncId)]
    pub fn generate_sync_id(&self) -> String {
        let mut rng = self.rng.borrow_mut();
        self.engine
            .borrow_mut()
            .generate_sync_id(&mut *rng)
            .to_string()
    }

    #[wasm_bindgen(js_name = syncId)]
    pub fn sync_id(&self) -> Option<String> {
        self.engine.borrow().sync_id().map(ToString::to_string)
    }

    /// Time of the last accepted push, as RFC 3339.
    #[wasm_bindgen(js_name = lastSyncTime)]
    pub fn last_sync_time(&self) -> Option<String> {
        self.client
            .as_ref()?
            .last_synced()
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Import progress for a typed sync code. Resolves to
    /// `{success, error?, unlock?}`; never rejects for sync failures.
    #[wasm_bindgen(js_name = pullFromCloud)]
    pub fn pull_from_cloud(&self, code: String) -> js_sys::Promise {
        let engine = Rc::clone(&self.engine);
        let client = self.client.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            let result = match client {
                None => ImportResult {
                    success: false,
                    error: Some("Cloud sync is not configured".to_string()),
                    unlock: None,
                },
                Some(client) => match pull_from_cloud(&*engine, &*client, &code).await {
                    Ok(unlock) => ImportResult {
                        success: true,
                        error: None,
                        unlock: unlock.map(UnlockView::from),
                    },
                    Err(err) => {
                        log::warn!("Cloud import failed: {err}");
                        ImportResult {
                            success: false,
                            error: Some(err.user_message()),
                            unlock: None,
                        }
                    }
                },
            };
            to_js(&result)
        })
    }

    /// Resolves to `true` when the endpoint advertises another version.
    #[wasm_bindgen(js_name = checkForUpdate)]
    pub fn check_for_update(&self) -> js_sys::Promise {
        let client = self.client.clone();
        let local = self.engine.borrow().app_version().to_string();
        wasm_bindgen_futures::future_to_promise(async move {
            let Some(client) = client else {
                return Ok(JsValue::FALSE);
            };
            let remote = client.fetch_remote_version().await;
            Ok(JsValue::from_bool(update_available(&local, remote.as_ref())))
        })
    }

    #[cfg(feature = "debug-tools")]
    #[wasm_bindgen(js_name = unlockAllDebug)]
    pub fn unlock_all_debug(&self) {
        self.engine.borrow_mut().unlock_all_debug();
    }
}
