use uuid::Uuid;
use wasm_bindgen::{JsCast, JsValue};

pub fn make_id() -> String {
    Uuid::new_v4().to_string()
}

/// Milliseconds since the Unix epoch; `Date.now()` in the browser.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Best-effort human-readable text for a thrown JavaScript value.
pub fn js_error_message(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{value:?}")
}
