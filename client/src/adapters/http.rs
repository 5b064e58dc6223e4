use async_trait::async_trait;
use notepin_shared::{Comment, CommentPatch};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

use crate::adapter::{AdapterError, CommentAdapter};
use crate::util::js_error_message;

/// Talks to the comment endpoints of `notepin_server`, e.g. `/api/pages/home`.
pub struct HttpAdapter {
    base_url: String,
}

impl HttpAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    fn collection_url(&self) -> String {
        format!("{}/comments", self.base_url)
    }

    fn item_url(&self, id: &str) -> String {
        let id = String::from(js_sys::encode_uri_component(id));
        format!("{}/comments/{id}", self.base_url)
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        body: Option<String>,
    ) -> Result<Response, AdapterError> {
        let js_error = |error: JsValue| AdapterError::new(js_error_message(&error));
        let init = RequestInit::new();
        init.set_method(method);
        if let Some(body) = &body {
            init.set_body(&JsValue::from_str(body));
        }
        let request = Request::new_with_str_and_init(url, &init).map_err(js_error)?;
        if body.is_some() {
            request
                .headers()
                .set("Content-Type", "application/json")
                .map_err(js_error)?;
        }
        let window = web_sys::window().ok_or_else(|| AdapterError::new("Missing window"))?;
        let response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_error)?;
        let response: Response = response
            .dyn_into()
            .map_err(|_| AdapterError::new("fetch did not return a Response"))?;
        if !response.ok() {
            return Err(AdapterError::new(format!(
                "{method} {url} failed with HTTP {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AdapterError> {
    serde_json::to_string(value).map_err(|error| AdapterError::new(error.to_string()))
}

#[async_trait(?Send)]
impl CommentAdapter for HttpAdapter {
    async fn save(&self, comment: &Comment) -> Result<(), AdapterError> {
        self.send("POST", &self.collection_url(), Some(to_json(comment)?))
            .await
            .map(|_| ())
    }

    async fn load(&self) -> Result<Vec<Comment>, AdapterError> {
        let response = self.send("GET", &self.collection_url(), None).await?;
        let text = response
            .text()
            .map_err(|error| AdapterError::new(js_error_message(&error)))?;
        let text = JsFuture::from(text)
            .await
            .map_err(|error| AdapterError::new(js_error_message(&error)))?
            .as_string()
            .unwrap_or_default();
        serde_json::from_str(&text)
            .map_err(|error| AdapterError::new(format!("invalid comment list: {error}")))
    }

    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<(), AdapterError> {
        self.send("PATCH", &self.item_url(id), Some(to_json(patch)?))
            .await
            .map(|_| ())
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        self.send("DELETE", &self.item_url(id), None)
            .await
            .map(|_| ())
    }
}
