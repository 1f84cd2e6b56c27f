//! App version marker and remote update check.
use serde::{Deserialize, Serialize};

use crate::constants::KEY_APP_VERSION;
use crate::storage::KeyValueStore;

/// Version advertised by the sync endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVersion {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Store the running version. Returns `true` when it differs from the
/// version recorded by the previous launch (including first launch).
pub fn record_app_version<S: KeyValueStore>(storage: &S, version: &str) -> bool {
    let previous = storage.get(KEY_APP_VERSION).unwrap_or_else(|err| {
        log::warn!("Failed to read app version marker: {err}");
        None
    });
    if previous.as_deref() == Some(version) {
        return false;
    }
    if let Err(err) = storage.set(KEY_APP_VERSION, version) {
        log::error!("Failed to write app version marker: {err}");
    }
    log::info!(
        "App version changed from {} to {version}",
        previous.as_deref().unwrap_or("<none>")
    );
    true
}

/// An update is offered whenever the remote advertises a different version.
#[must_use]
pub fn update_available(local: &str, remote: Option<&RemoteVersion>) -> bool {
    remote.is_some_and(|r| !r.version.is_empty() && r.version != local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn marker_reports_changes_only() {
        let store = MemoryStore::new();
        assert!(record_app_version(&store, "1.2.9"));
        assert!(!record_app_version(&store, "1.2.9"));
        assert!(record_app_version(&store, "1.3.0"));
        assert_eq!(store.get(KEY_APP_VERSION).unwrap().as_deref(), Some("1.3.0"));
    }

    #[test]
    fn update_requires_a_different_remote_version() {
        let remote = RemoteVersion {
            version: "1.3.0".into(),
            hash: None,
        };
        assert!(update_available("1.2.9", Some(&remote)));
        assert!(!update_available("1.3.0", Some(&remote)));
        assert!(!update_available("1.2.9", None));
    }
}
