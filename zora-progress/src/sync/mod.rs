//! Best-effort cloud mirror of local progress, keyed by a shareable sync code.
//!
//! Local storage stays the source of truth. Pushes are fire-and-forget and
//! only ever logged on failure; an explicit pull verifies the remote checksum
//! and refuses corrupted data.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

use crate::checksum::{ChecksumGuard, Digest};
use crate::constants::{ACTION_LOAD_PROGRESS, ACTION_SAVE_PROGRESS, STATUS_SUCCESS};
use crate::milestone::UnlockedMilestones;
use crate::progress::LevelProgress;
use crate::version::RemoteVersion;

#[cfg(feature = "async")]
mod auto;
mod debounce;
mod identity;

#[cfg(feature = "async")]
pub use auto::AutoSync;
pub use debounce::{PendingPush, PushDebouncer, PushTicket};
pub use identity::{SyncId, SyncIdError, clear_sync_id, load_sync_id, store_sync_id};

/// Progress and milestones as mirrored to the cloud.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub progress: LevelProgress,
    pub milestones: UnlockedMilestones,
}

/// Body of the `save_progress` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressRequest<'a> {
    pub action: &'static str,
    pub sync_id: &'a SyncId,
    pub level_progress: &'a LevelProgress,
    pub unlocked_milestones: &'a UnlockedMilestones,
    pub checksum: Digest,
}

/// Reply to `load_progress`. On success `progress` and `milestones` hold JSON
/// text that must be parsed again.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadProgressResponse {
    pub status: String,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub milestones: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// HTTP-like access to the sync endpoint.
///
/// Futures are not `Send`: the browser event loop and a Tokio `LocalSet`
/// both drive them on one thread.
#[async_trait(?Send)]
pub trait RemoteTransport {
    /// Post a JSON body. The response is not interpreted.
    async fn post_json(&self, body: &serde_json::Value) -> Result<(), TransportError>;

    /// Issue a GET with the given query pairs and decode the JSON reply.
    async fn get_json(&self, query: &[(&str, &str)]) -> Result<serde_json::Value, TransportError>;
}

#[async_trait(?Send)]
impl<T: RemoteTransport + ?Sized> RemoteTransport for Rc<T> {
    async fn post_json(&self, body: &serde_json::Value) -> Result<(), TransportError> {
        (**self).post_json(body).await
    }

    async fn get_json(&self, query: &[(&str, &str)]) -> Result<serde_json::Value, TransportError> {
        (**self).get_json(query).await
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Connection Error: {0}")]
    Transport(#[from] TransportError),
    #[error("Connection Error: malformed response: {0}")]
    Malformed(String),
    #[error("remote error ({status}): {message}")]
    Remote { status: String, message: String },
    #[error("Integrity Failed")]
    IntegrityFailed,
    #[error("invalid sync code: {0}")]
    InvalidSyncId(#[from] SyncIdError),
}

impl SyncError {
    /// Text shown to the player for a failed import.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) | Self::Malformed(_) => "Connection Error".to_string(),
            Self::Remote { message, .. } => message.clone(),
            Self::IntegrityFailed => "Integrity Failed".to_string(),
            Self::InvalidSyncId(err) => err.to_string(),
        }
    }
}

/// Implemented by debounce drivers that push the latest snapshot after a quiet
/// period.
pub trait PushScheduler {
    /// Schedule a push of `snapshot`, superseding any push not yet sent.
    fn schedule_push(&self, snapshot: ProgressSnapshot, sync_id: SyncId);

    /// Drop any scheduled push.
    fn cancel_pending(&self);
}

impl<P: PushScheduler + ?Sized> PushScheduler for Rc<P> {
    fn schedule_push(&self, snapshot: ProgressSnapshot, sync_id: SyncId) {
        (**self).schedule_push(snapshot, sync_id);
    }

    fn cancel_pending(&self) {
        (**self).cancel_pending();
    }
}

pub struct SyncClient<T> {
    transport: T,
    guard: ChecksumGuard,
    last_synced: Cell<Option<DateTime<Utc>>>,
}

impl<T: RemoteTransport> SyncClient<T> {
    pub fn new(transport: T, guard: ChecksumGuard) -> Self {
        Self {
            transport,
            guard,
            last_synced: Cell::new(None),
        }
    }

    /// Time of the last push the transport accepted.
    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced.get()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mirror `snapshot` to the cloud. Failures are logged and swallowed;
    /// the return value only reports whether the request went out.
    pub async fn push(&self, snapshot: &ProgressSnapshot, sync_id: &SyncId) -> bool {
        let body = match self.save_request_body(snapshot, sync_id) {
            Ok(body) => body,
            Err(err) => {
                log::warn!("Cloud sync skipped, cannot encode progress: {err}");
                return false;
            }
        };
        match self.transport.post_json(&body).await {
            Ok(()) => {
                self.last_synced.set(Some(Utc::now()));
                log::info!("Cloud sync: progress saved for {sync_id}");
                true
            }
            Err(err) => {
                log::warn!("Cloud sync failed: {err}");
                false
            }
        }
    }

    /// Fetch the remote copy for `sync_id` and verify its checksum.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] or [`SyncError::Malformed`] when the
    /// remote cannot be reached or read, [`SyncError::Remote`] when it reports
    /// a failure, and [`SyncError::IntegrityFailed`] when the checksum does
    /// not match the returned progress.
    pub async fn pull(&self, sync_id: &SyncId) -> Result<ProgressSnapshot, SyncError> {
        let reply = self
            .transport
            .get_json(&[("action", ACTION_LOAD_PROGRESS), ("syncId", sync_id.as_str())])
            .await?;
        let response: LoadProgressResponse =
            serde_json::from_value(reply).map_err(|err| SyncError::Malformed(err.to_string()))?;
        let snapshot = self.decode_load_response(response)?;
        log::info!("Cloud sync: progress loaded for {sync_id}");
        Ok(snapshot)
    }

    /// Read `{version, hash}` from the endpoint. Failures are logged.
    pub async fn fetch_remote_version(&self) -> Option<RemoteVersion> {
        let reply = match self.transport.get_json(&[]).await {
            Ok(reply) => reply,
            Err(err) => {
                log::warn!("Remote version check failed: {err}");
                return None;
            }
        };
        match serde_json::from_value::<RemoteVersion>(reply) {
            Ok(remote) if !remote.version.is_empty() => Some(remote),
            Ok(_) => None,
            Err(err) => {
                log::warn!("Remote version check returned an unexpected body: {err}");
                None
            }
        }
    }

    fn save_request_body(
        &self,
        snapshot: &ProgressSnapshot,
        sync_id: &SyncId,
    ) -> Result<serde_json::Value, serde_json::Error> {
        let request = SaveProgressRequest {
            action: ACTION_SAVE_PROGRESS,
            sync_id,
            level_progress: &snapshot.progress,
            unlocked_milestones: &snapshot.milestones,
            checksum: self.guard.compute(&snapshot.progress)?,
        };
        serde_json::to_value(request)
    }

    fn decode_load_response(
        &self,
        response: LoadProgressResponse,
    ) -> Result<ProgressSnapshot, SyncError> {
        if response.status != STATUS_SUCCESS {
            return Err(SyncError::Remote {
                message: response
                    .message
                    .unwrap_or_else(|| format!("sync failed with status {}", response.status)),
                status: response.status,
            });
        }
        let progress_text = response
            .progress
            .ok_or_else(|| SyncError::Malformed("missing progress".to_string()))?;
        let progress: LevelProgress = serde_json::from_str(&progress_text)
            .map_err(|err| SyncError::Malformed(format!("progress: {err}")))?;
        let milestones: UnlockedMilestones = match response.milestones.as_deref() {
            Some(text) => serde_json::from_str(text)
                .map_err(|err| SyncError::Malformed(format!("milestones: {err}")))?,
            None => UnlockedMilestones::new(),
        };
        // Rows written by other clients keep their own key order, so the
        // received text is checked before the canonical form.
        let intact = response.checksum.map(Digest::from_stored).is_some_and(|digest| {
            self.guard.digest_serialized(&progress_text) == digest
                || self.guard.verify(&progress, &digest)
        });
        if !intact {
            log::warn!("Cloud import rejected: checksum mismatch");
            return Err(SyncError::IntegrityFailed);
        }
        Ok(ProgressSnapshot {
            progress,
            milestones,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelId, SpecialStage, Stars};
    use crate::milestone::{MilestoneToken, StarThreshold};
    use futures::executor::block_on;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct ScriptedTransport {
        posts: RefCell<Vec<serde_json::Value>>,
        reply: RefCell<Option<Result<serde_json::Value, TransportError>>>,
        queries: RefCell<Vec<Vec<(String, String)>>>,
    }

    impl ScriptedTransport {
        fn replying(reply: Result<serde_json::Value, TransportError>) -> Self {
            let transport = Self::default();
            *transport.reply.borrow_mut() = Some(reply);
            transport
        }
    }

    #[async_trait(?Send)]
    impl RemoteTransport for ScriptedTransport {
        async fn post_json(&self, body: &serde_json::Value) -> Result<(), TransportError> {
            self.posts.borrow_mut().push(body.clone());
            Ok(())
        }

        async fn get_json(
            &self,
            query: &[(&str, &str)],
        ) -> Result<serde_json::Value, TransportError> {
            self.queries.borrow_mut().push(
                query
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            );
            self.reply
                .borrow_mut()
                .take()
                .unwrap_or_else(|| Err(TransportError("no reply scripted".into())))
        }
    }

    fn sample_snapshot() -> ProgressSnapshot {
        let progress: LevelProgress = [(LevelId::Main(1), Stars::new(3).unwrap())]
            .into_iter()
            .collect();
        let milestones: UnlockedMilestones = [MilestoneToken::Stars(StarThreshold::Adventurer)]
            .into_iter()
            .collect();
        ProgressSnapshot {
            progress,
            milestones,
        }
    }

    fn sync_id() -> SyncId {
        SyncId::parse("ZORA-AB23").unwrap()
    }

    #[test]
    fn push_posts_save_progress_body() {
        let client = SyncClient::new(ScriptedTransport::default(), ChecksumGuard::default());
        assert!(block_on(client.push(&sample_snapshot(), &sync_id())));
        let posts = client.transport().posts.borrow();
        let body = &posts[0];
        assert_eq!(body["action"], "save_progress");
        assert_eq!(body["syncId"], "ZORA-AB23");
        assert_eq!(body["levelProgress"], json!({"1": 3}));
        assert_eq!(body["unlockedMilestones"], json!([10]));
        let expected = ChecksumGuard::default()
            .compute(&sample_snapshot().progress)
            .unwrap();
        assert_eq!(body["checksum"], expected.as_str());
        assert!(client.last_synced().is_some());
    }

    #[test]
    fn pull_accepts_matching_checksum() {
        let snapshot = sample_snapshot();
        let checksum = ChecksumGuard::default().compute(&snapshot.progress).unwrap();
        let reply = json!({
            "status": "success",
            "progress": serde_json::to_string(&snapshot.progress).unwrap(),
            "milestones": serde_json::to_string(&snapshot.milestones).unwrap(),
            "checksum": checksum.as_str(),
        });
        let client = SyncClient::new(ScriptedTransport::replying(Ok(reply)), ChecksumGuard::default());
        let pulled = block_on(client.pull(&sync_id())).unwrap();
        assert_eq!(pulled, snapshot);
        let queries = client.transport().queries.borrow();
        assert_eq!(
            queries[0],
            vec![
                ("action".to_string(), "load_progress".to_string()),
                ("syncId".to_string(), "ZORA-AB23".to_string())
            ]
        );
    }

    #[test]
    fn pull_rejects_checksum_mismatch() {
        let reply = json!({
            "status": "success",
            "progress": r#"{"1":3,"2":3}"#,
            "milestones": "[]",
            "checksum": "deadbeef",
        });
        let client = SyncClient::new(ScriptedTransport::replying(Ok(reply)), ChecksumGuard::default());
        let err = block_on(client.pull(&sync_id())).unwrap_err();
        assert!(matches!(err, SyncError::IntegrityFailed));
        assert_eq!(err.user_message(), "Integrity Failed");
    }

    #[test]
    fn pull_accepts_row_with_special_keys_out_of_order() {
        let text = r#"{"1":3,"2":3,"14":2,"S2":1,"S1":2}"#;
        let checksum = ChecksumGuard::default().digest_serialized(text);
        let reply = json!({
            "status": "success",
            "progress": text,
            "milestones": r#"["S2"]"#,
            "checksum": checksum.as_str(),
        });
        let client = SyncClient::new(ScriptedTransport::replying(Ok(reply)), ChecksumGuard::default());
        let pulled = block_on(client.pull(&sync_id())).unwrap();
        assert_eq!(pulled.progress.total_stars(), 11);
        assert_eq!(
            pulled.progress.stars_for(LevelId::Special(SpecialStage::S1)),
            Stars::new(2).unwrap()
        );
        // The canonical rendering sorts S1 first, so only the received text
        // can match this checksum.
        assert!(!ChecksumGuard::default().verify(&pulled.progress, &checksum));
    }

    #[test]
    fn pull_surfaces_remote_message() {
        let reply = json!({"status": "error", "message": "Sync ID not found"});
        let client = SyncClient::new(ScriptedTransport::replying(Ok(reply)), ChecksumGuard::default());
        let err = block_on(client.pull(&sync_id())).unwrap_err();
        assert_eq!(err.user_message(), "Sync ID not found");
    }

    #[test]
    fn pull_maps_transport_and_malformed_replies_to_connection_error() {
        let client = SyncClient::new(
            ScriptedTransport::replying(Err(TransportError("offline".into()))),
            ChecksumGuard::default(),
        );
        let err = block_on(client.pull(&sync_id())).unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert_eq!(err.user_message(), "Connection Error");

        let reply = json!({"status": "success", "progress": "not json", "checksum": "0"});
        let client = SyncClient::new(ScriptedTransport::replying(Ok(reply)), ChecksumGuard::default());
        let err = block_on(client.pull(&sync_id())).unwrap_err();
        assert!(matches!(err, SyncError::Malformed(_)));
        assert_eq!(err.user_message(), "Connection Error");
    }

    #[test]
    fn remote_version_is_read_from_bare_get() {
        let reply = json!({"version": "1.3.0", "hash": "abc"});
        let client = SyncClient::new(ScriptedTransport::replying(Ok(reply)), ChecksumGuard::default());
        let remote = block_on(client.fetch_remote_version()).unwrap();
        assert_eq!(remote.version, "1.3.0");
        assert_eq!(remote.hash.as_deref(), Some("abc"));
        assert!(client.transport().queries.borrow()[0].is_empty());
    }
}
