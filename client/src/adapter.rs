use async_trait::async_trait;
use notepin_shared::{Comment, CommentPatch};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdapterError {
    message: String,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Persistence backend for an [`Annotator`](crate::Annotator).
///
/// Every call may suspend for as long as the implementation likes and may fail for any
/// reason. The engine never retries; bound latency by wrapping the adapter.
#[async_trait(?Send)]
pub trait CommentAdapter {
    async fn save(&self, comment: &Comment) -> Result<(), AdapterError>;
    async fn load(&self) -> Result<Vec<Comment>, AdapterError>;
    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<(), AdapterError>;
    async fn delete(&self, id: &str) -> Result<(), AdapterError>;
}
