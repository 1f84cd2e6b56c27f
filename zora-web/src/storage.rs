//! `localStorage` backend for the progress store.
use wasm_bindgen::JsValue;
use web_sys::Storage;
use zora_progress::KeyValueStore;

use crate::dom;

#[derive(Debug, thiserror::Error)]
pub enum WebStorageError {
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<JsValue> for WebStorageError {
    fn from(value: JsValue) -> Self {
        Self::Storage(dom::js_error_message(&value))
    }
}

/// Browser key/value storage. Clones share the same underlying handle.
#[derive(Debug, Clone)]
pub struct WebStorage {
    storage: Storage,
}

impl WebStorage {
    /// Open the page's `localStorage`.
    ///
    /// # Errors
    ///
    /// Returns an error when storage is disabled (private mode, sandboxed
    /// frames) or there is no window.
    pub fn local() -> Result<Self, WebStorageError> {
        Ok(Self {
            storage: dom::local_storage()?,
        })
    }
}

impl KeyValueStore for WebStorage {
    type Error = WebStorageError;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.storage.get_item(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        Ok(self.storage.set_item(key, value)?)
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        Ok(self.storage.remove_item(key)?)
    }
}

/// Drop per-session notification flags ("new level" badges). Failures are
/// logged.
pub fn clear_session_flags() {
    if let Err(err) = dom::session_storage().and_then(|storage| storage.clear()) {
        log::warn!(
            "Session storage clear failed: {}",
            dom::js_error_message(&err)
        );
    }
}
