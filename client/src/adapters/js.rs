use async_trait::async_trait;
use js_sys::{Function, Promise, Reflect};
use notepin_shared::{Comment, CommentPatch};
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::adapter::{AdapterError, CommentAdapter};
use crate::util::js_error_message;

const METHODS: [&str; 4] = ["save", "load", "update", "delete"];

/// Wraps a JavaScript object with `save`, `load`, `update` and `delete` methods. Each may
/// return a promise or a plain value; a rejection or throw becomes an [`AdapterError`].
pub struct JsAdapter {
    target: JsValue,
}

impl JsAdapter {
    pub fn new(target: JsValue) -> Result<Self, AdapterError> {
        for name in METHODS {
            method(&target, name)?;
        }
        Ok(Self { target })
    }

    async fn invoke(&self, name: &str, args: &[JsValue]) -> Result<JsValue, AdapterError> {
        let function = method(&self.target, name)?;
        let returned = match args {
            [] => function.call0(&self.target),
            [first] => function.call1(&self.target, first),
            [first, second, ..] => function.call2(&self.target, first, second),
        }
        .map_err(|error| AdapterError::new(js_error_message(&error)))?;
        JsFuture::from(Promise::resolve(&returned))
            .await
            .map_err(|error| AdapterError::new(js_error_message(&error)))
    }
}

fn method(target: &JsValue, name: &str) -> Result<Function, AdapterError> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
        .ok_or_else(|| AdapterError::new(format!("adapter is missing a {name}() function")))
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, AdapterError> {
    to_js(value).map_err(|error| AdapterError::new(error.to_string()))
}

#[async_trait(?Send)]
impl CommentAdapter for JsAdapter {
    async fn save(&self, comment: &Comment) -> Result<(), AdapterError> {
        self.invoke("save", &[encode(comment)?]).await.map(|_| ())
    }

    async fn load(&self) -> Result<Vec<Comment>, AdapterError> {
        let value = self.invoke("load", &[]).await?;
        if value.is_undefined() || value.is_null() {
            return Ok(Vec::new());
        }
        serde_wasm_bindgen::from_value(value)
            .map_err(|error| AdapterError::new(format!("invalid comment list: {error}")))
    }

    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<(), AdapterError> {
        self.invoke("update", &[JsValue::from_str(id), encode(patch)?])
            .await
            .map(|_| ())
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        self.invoke("delete", &[JsValue::from_str(id)])
            .await
            .map(|_| ())
    }
}
