use std::collections::HashMap;
use std::sync::Arc;

use notepin_shared::Comment;
use tokio::sync::RwLock;

use crate::storage::Storage;

pub const MAX_COMMENTS_PER_PAGE: usize = 5000;
pub const MAX_TEXT_LEN: usize = 10_000;
pub const MAX_ID_LEN: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub pages: Arc<RwLock<HashMap<String, Arc<RwLock<Page>>>>>,
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            pages: Arc::new(RwLock::new(HashMap::new())),
            storage,
        }
    }
}

/// In-memory copy of one page's comments. `dirty` is set by every mutation and cleared
/// when the page is flushed to storage.
#[derive(Debug, Default)]
pub struct Page {
    pub comments: Vec<Comment>,
    pub dirty: bool,
}

impl Page {
    pub fn new(comments: Vec<Comment>) -> Self {
        Self {
            comments,
            dirty: false,
        }
    }
}
