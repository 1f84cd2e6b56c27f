#![forbid(unsafe_code)]
//! Browser bindings for Zora progress: `localStorage` persistence, `fetch`
//! cloud sync and the [`api::ZoraProgress`] object exported to JavaScript.
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod api;
pub mod auto_sync;
pub mod dom;
pub mod logger;
pub mod storage;
pub mod transport;

pub use api::ZoraProgress;
pub use auto_sync::WebAutoSync;
pub use storage::{WebStorage, WebStorageError};
pub use transport::FetchTransport;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logger::init(log::LevelFilter::Info);
}
