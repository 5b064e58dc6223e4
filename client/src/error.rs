use notepin_shared::ValidationError;
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::surface::SurfaceError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("annotation layer is already mounted")]
    AlreadyMounted,
    #[error("mount target is not attached to a live document")]
    DetachedTarget,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("annotation layer is not mounted")]
    NotMounted,
    #[error("comment {0} not found")]
    NotFound(String),
    #[error("annotate mode is disabled for a read-only mount")]
    ReadOnly,
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error("failed to {operation} comment: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: AdapterError,
    },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

impl EngineError {
    pub(crate) fn persistence(operation: &'static str, source: AdapterError) -> Self {
        EngineError::Persistence { operation, source }
    }

    /// Taxonomy name surfaced to JavaScript as `Error.name`.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "ValidationError",
            EngineError::NotMounted => "NotMountedError",
            EngineError::NotFound(_) => "NotFoundError",
            EngineError::ReadOnly => "ReadOnlyError",
            EngineError::Mount(_) | EngineError::Surface(_) => "MountError",
            EngineError::Persistence { .. } => "PersistenceError",
        }
    }
}
