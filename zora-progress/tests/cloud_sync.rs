use async_trait::async_trait;
use futures::executor::block_on;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use zora_progress::{
    ChecksumGuard, CoreConfig, LevelId, MemoryStore, ProgressEngine, RemoteTransport,
    SpecialStage, SyncClient, SyncError, TransportError, pull_from_cloud,
};

/// Stored row of the fake endpoint, as text like the real sheet keeps it.
#[derive(Clone)]
struct Row {
    progress: String,
    milestones: String,
    checksum: String,
}

#[derive(Default)]
struct FakeEndpoint {
    rows: RefCell<HashMap<String, Row>>,
    offline: RefCell<bool>,
}

#[async_trait(?Send)]
impl RemoteTransport for FakeEndpoint {
    async fn post_json(&self, body: &Value) -> Result<(), TransportError> {
        if *self.offline.borrow() {
            return Err(TransportError("offline".into()));
        }
        let id = body["syncId"].as_str().unwrap_or_default().to_string();
        self.rows.borrow_mut().insert(
            id,
            Row {
                progress: body["levelProgress"].to_string(),
                milestones: body["unlockedMilestones"].to_string(),
                checksum: body["checksum"].as_str().unwrap_or_default().to_string(),
            },
        );
        Ok(())
    }

    async fn get_json(&self, query: &[(&str, &str)]) -> Result<Value, TransportError> {
        if *self.offline.borrow() {
            return Err(TransportError("offline".into()));
        }
        let id = query
            .iter()
            .find(|(k, _)| *k == "syncId")
            .map(|(_, v)| *v)
            .unwrap_or_default();
        Ok(match self.rows.borrow().get(id) {
            Some(row) => json!({
                "status": "success",
                "progress": row.progress,
                "milestones": row.milestones,
                "checksum": row.checksum,
            }),
            None => json!({"status": "error", "message": "Sync ID not found"}),
        })
    }
}

fn client(endpoint: &Rc<FakeEndpoint>) -> SyncClient<Rc<FakeEndpoint>> {
    SyncClient::new(Rc::clone(endpoint), ChecksumGuard::default())
}

fn device() -> (MemoryStore, RefCell<ProgressEngine<MemoryStore>>) {
    let backend = MemoryStore::new();
    let engine = ProgressEngine::load(backend.clone(), &CoreConfig::default());
    (backend, RefCell::new(engine))
}

#[test]
fn progress_moves_between_devices() {
    let endpoint = Rc::new(FakeEndpoint::default());
    let (_, phone) = device();
    {
        let mut phone = phone.borrow_mut();
        for level in 1..=8 {
            phone.record_level_result(LevelId::Main(level), 3);
        }
        phone.record_level_result(LevelId::Special(SpecialStage::S1), 2);
        while phone.current_milestone_to_unlock().is_some() {
            phone.continue_unlock().unwrap();
        }
    }
    let code = phone
        .borrow_mut()
        .generate_sync_id(&mut ChaCha20Rng::seed_from_u64(11));
    let snapshot = phone.borrow().snapshot();
    assert!(block_on(client(&endpoint).push(&snapshot, &code)));

    let (tablet_store, tablet) = device();
    let typed = code.as_str().to_lowercase();
    let event = block_on(pull_from_cloud(&tablet, &client(&endpoint), &typed)).unwrap();
    assert!(event.is_none(), "milestones shown on the phone stay shown");

    let tablet = tablet.borrow();
    assert_eq!(tablet.progress(), phone.borrow().progress());
    assert_eq!(tablet.milestones(), phone.borrow().milestones());
    assert_eq!(tablet.sync_id(), Some(&code));
    let reloaded = ProgressEngine::load(tablet_store, &CoreConfig::default());
    assert_eq!(reloaded.sync_id(), Some(&code));
    assert_eq!(reloaded.total_stars(), 26);
}

#[test]
fn unknown_code_surfaces_remote_message() {
    let endpoint = Rc::new(FakeEndpoint::default());
    let (backend, engine) = device();
    let err = block_on(pull_from_cloud(&engine, &client(&endpoint), "ZORA-ZZZZ")).unwrap_err();
    assert!(matches!(err, SyncError::Remote { .. }));
    assert_eq!(err.user_message(), "Sync ID not found");
    assert!(backend.snapshot().is_empty());
}

#[test]
fn corrupted_remote_row_is_refused() {
    let endpoint = Rc::new(FakeEndpoint::default());
    let (_, source) = device();
    source.borrow_mut().record_level_result(LevelId::Main(1), 2);
    let code = source
        .borrow_mut()
        .generate_sync_id(&mut ChaCha20Rng::seed_from_u64(2));
    let snapshot = source.borrow().snapshot();
    block_on(client(&endpoint).push(&snapshot, &code));
    if let Some(row) = endpoint.rows.borrow_mut().get_mut(code.as_str()) {
        row.progress = r#"{"1":3}"#.to_string();
    }

    let (backend, target) = device();
    target.borrow_mut().record_level_result(LevelId::Main(4), 1);
    let before = backend.snapshot();
    let err = block_on(pull_from_cloud(&target, &client(&endpoint), code.as_str())).unwrap_err();
    assert_eq!(err.user_message(), "Integrity Failed");
    assert_eq!(backend.snapshot(), before);
    assert_eq!(target.borrow().total_stars(), 1);
}

#[test]
fn offline_push_is_swallowed_and_pull_reports_connection_error() {
    let endpoint = Rc::new(FakeEndpoint::default());
    *endpoint.offline.borrow_mut() = true;
    let (_, engine) = device();
    let code = engine
        .borrow_mut()
        .generate_sync_id(&mut ChaCha20Rng::seed_from_u64(4));
    let sync = client(&endpoint);
    let snapshot = engine.borrow().snapshot();
    assert!(!block_on(sync.push(&snapshot, &code)));
    assert!(sync.last_synced().is_none());

    let err = block_on(pull_from_cloud(&engine, &sync, code.as_str())).unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert_eq!(err.user_message(), "Connection Error");
}
