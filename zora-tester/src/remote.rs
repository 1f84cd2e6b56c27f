//! In-memory stand-in for the sync endpoint.
use async_trait::async_trait;
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use zora_progress::constants::{ACTION_LOAD_PROGRESS, ACTION_SAVE_PROGRESS, STATUS_SUCCESS};
use zora_progress::{RemoteTransport, TransportError};

/// One saved row. Progress and milestones are kept as JSON text, the way the
/// deployed sheet stores them.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub progress: String,
    pub milestones: String,
    pub checksum: String,
}

#[derive(Debug, Default)]
pub struct MockRemote {
    rows: RefCell<HashMap<String, StoredRow>>,
    pushes: Cell<usize>,
    offline: Cell<bool>,
    version: RefCell<Option<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.get()
    }

    pub fn row(&self, sync_id: &str) -> Option<StoredRow> {
        self.rows.borrow().get(sync_id).cloned()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn set_version(&self, version: &str) {
        *self.version.borrow_mut() = Some(version.to_string());
    }

    /// Overwrite the stored progress text without touching its checksum.
    pub fn corrupt_progress(&self, sync_id: &str, progress: &str) -> bool {
        match self.rows.borrow_mut().get_mut(sync_id) {
            Some(row) => {
                row.progress = progress.to_string();
                true
            }
            None => false,
        }
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.offline.get() {
            Err(TransportError("network unreachable".into()))
        } else {
            Ok(())
        }
    }
}

fn query_value<'a>(query: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    query.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[async_trait(?Send)]
impl RemoteTransport for MockRemote {
    async fn post_json(&self, body: &Value) -> Result<(), TransportError> {
        self.check_online()?;
        self.pushes.set(self.pushes.get() + 1);
        if body["action"] != ACTION_SAVE_PROGRESS {
            log::warn!("Mock remote ignoring post with action {}", body["action"]);
            return Ok(());
        }
        let Some(sync_id) = body["syncId"].as_str() else {
            return Ok(());
        };
        let row = StoredRow {
            progress: body["levelProgress"].to_string(),
            milestones: body["unlockedMilestones"].to_string(),
            checksum: body["checksum"].as_str().unwrap_or_default().to_string(),
        };
        self.rows.borrow_mut().insert(sync_id.to_string(), row);
        Ok(())
    }

    async fn get_json(&self, query: &[(&str, &str)]) -> Result<Value, TransportError> {
        self.check_online()?;
        if query_value(query, "action") != Some(ACTION_LOAD_PROGRESS) {
            let version = self.version.borrow().clone().unwrap_or_default();
            return Ok(json!({ "version": version, "hash": "mock" }));
        }
        let sync_id = query_value(query, "syncId").unwrap_or_default();
        Ok(match self.rows.borrow().get(sync_id) {
            Some(row) => json!({
                "status": STATUS_SUCCESS,
                "progress": row.progress,
                "milestones": row.milestones,
                "checksum": row.checksum,
            }),
            None => json!({ "status": "error", "message": "Sync ID not found" }),
        })
    }
}
