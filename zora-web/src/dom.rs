use js_sys::Promise;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response, Storage, Url, Window};

/// Retrieve the global `window` object.
///
/// # Errors
/// Returns an error outside of a browser context where `window` is unavailable.
pub fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("`window` unavailable"))
}

/// Convert a JavaScript value into a readable string for error reporting.
#[must_use]
pub fn js_error_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| err.message().into())
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

/// Resolve after `delay`, using the promise's own `resolve` as the
/// `setTimeout` callback.
///
/// # Errors
/// Returns an error if the timer cannot be scheduled.
#[allow(clippy::future_not_send)]
pub async fn sleep(delay: Duration) -> Result<(), JsValue> {
    let window = window()?;
    let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    let mut scheduled: Result<i32, JsValue> = Ok(0);
    let promise = Promise::new(&mut |resolve, _reject| {
        scheduled =
            window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis);
    });
    scheduled?;
    JsFuture::from(promise).await.map(drop)
}

/// `GET` a URL and decode its JSON body.
///
/// # Errors
/// Returns an error if the request fails or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn fetch_json(url: &str) -> Result<JsValue, JsValue> {
    let resp_value = JsFuture::from(window()?.fetch_with_str(url)).await?;
    let response: Response = resp_value.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }
    JsFuture::from(response.json()?).await
}

/// `POST` a text body without reading the reply. The request is sent in
/// `no-cors` mode, so the response is opaque by construction.
///
/// # Errors
/// Returns an error if the request cannot be built or the network rejects it.
#[allow(clippy::future_not_send)]
pub async fn post_opaque(url: &str, body: &str) -> Result<(), JsValue> {
    let init = RequestInit::new();
    init.set_method("POST");
    init.set_mode(RequestMode::NoCors);
    init.set_body(&JsValue::from_str(body));
    let request = Request::new_with_str_and_init(url, &init)?;
    JsFuture::from(window()?.fetch_with_request(&request)).await?;
    Ok(())
}

/// Append `query` pairs to `base`, percent-encoding as needed.
///
/// # Errors
/// Returns an error if `base` is not an absolute URL.
pub fn url_with_query(base: &str, query: &[(&str, &str)]) -> Result<String, JsValue> {
    let url = Url::new(base)?;
    let params = url.search_params();
    for (key, value) in query {
        params.append(key, value);
    }
    Ok(url.href())
}

/// Access the browser `localStorage` handle.
///
/// # Errors
/// Returns an error if the browser window cannot be accessed or `localStorage` is unavailable.
pub fn local_storage() -> Result<Storage, JsValue> {
    window()?
        .local_storage()?
        .ok_or_else(|| JsValue::from_str("localStorage unavailable"))
}

/// Access the browser `sessionStorage` handle.
///
/// # Errors
/// Returns an error if `sessionStorage` is unavailable.
pub fn session_storage() -> Result<Storage, JsValue> {
    window()?
        .session_storage()?
        .ok_or_else(|| JsValue::from_str("sessionStorage unavailable"))
}
