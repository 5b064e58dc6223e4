use async_trait::async_trait;
use notepin_shared::{Comment, CommentPatch};
use web_sys::Storage;

use crate::adapter::{AdapterError, CommentAdapter};
use crate::util::js_error_message;

pub const DEFAULT_STORAGE_KEY: &str = "notepin:comments";

/// Stores all comments as one JSON array under a `localStorage` key.
pub struct LocalStorageAdapter {
    key: String,
}

impl LocalStorageAdapter {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage(&self) -> Result<Storage, AdapterError> {
        let window = web_sys::window().ok_or_else(|| AdapterError::new("Missing window"))?;
        window
            .local_storage()
            .map_err(|error| AdapterError::new(js_error_message(&error)))?
            .ok_or_else(|| AdapterError::new("localStorage is unavailable"))
    }

    fn read(&self) -> Result<Vec<Comment>, AdapterError> {
        let stored = self
            .storage()?
            .get_item(&self.key)
            .map_err(|error| AdapterError::new(js_error_message(&error)))?;
        match stored {
            Some(text) => serde_json::from_str(&text).map_err(|error| {
                AdapterError::new(format!("corrupt data under {}: {error}", self.key))
            }),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, comments: &[Comment]) -> Result<(), AdapterError> {
        let payload =
            serde_json::to_string(comments).map_err(|error| AdapterError::new(error.to_string()))?;
        self.storage()?
            .set_item(&self.key, &payload)
            .map_err(|error| AdapterError::new(js_error_message(&error)))
    }
}

impl Default for LocalStorageAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_KEY)
    }
}

#[async_trait(?Send)]
impl CommentAdapter for LocalStorageAdapter {
    async fn save(&self, comment: &Comment) -> Result<(), AdapterError> {
        let mut comments = self.read()?;
        comments.retain(|existing| existing.id != comment.id);
        comments.push(comment.clone());
        self.write(&comments)
    }

    async fn load(&self) -> Result<Vec<Comment>, AdapterError> {
        self.read()
    }

    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<(), AdapterError> {
        let mut comments = self.read()?;
        let Some(comment) = comments.iter_mut().find(|comment| comment.id == id) else {
            return Err(AdapterError::new(format!("comment {id} is not stored")));
        };
        comment.apply(patch);
        self.write(&comments)
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        let mut comments = self.read()?;
        comments.retain(|comment| comment.id != id);
        self.write(&comments)
    }
}
