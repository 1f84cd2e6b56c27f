//! `fetch`-backed access to the sync endpoint.
use async_trait::async_trait;
use zora_progress::{RemoteTransport, TransportError};

use crate::dom;

/// Talks to the deployed sync script at `endpoint`.
#[derive(Debug, Clone)]
pub struct FetchTransport {
    endpoint: String,
}

impl FetchTransport {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn transport_error(value: &wasm_bindgen::JsValue) -> TransportError {
    TransportError(dom::js_error_message(value))
}

#[async_trait(?Send)]
impl RemoteTransport for FetchTransport {
    async fn post_json(&self, body: &serde_json::Value) -> Result<(), TransportError> {
        let text = serde_json::to_string(body).map_err(|err| TransportError(err.to_string()))?;
        dom::post_opaque(&self.endpoint, &text)
            .await
            .map_err(|err| transport_error(&err))
    }

    async fn get_json(&self, query: &[(&str, &str)]) -> Result<serde_json::Value, TransportError> {
        let url = dom::url_with_query(&self.endpoint, query).map_err(|err| transport_error(&err))?;
        let body = dom::fetch_json(&url)
            .await
            .map_err(|err| transport_error(&err))?;
        serde_wasm_bindgen::from_value(body).map_err(|err| TransportError(err.to_string()))
    }
}
