use std::sync::Arc;

use notepin_shared::CommentFileData;
use tokio::sync::RwLock;

use crate::logic::sanitize_comments;
use crate::state::{AppState, Page};
use crate::storage::StorageError;

const MAX_PAGE_ID_LEN: usize = 64;

/// Page ids are 1 to 64 characters of `[A-Za-z0-9_-]`; they double as file and object names.
pub fn normalize_page_id(value: &str) -> Option<String> {
    let valid = !value.is_empty()
        && value.len() <= MAX_PAGE_ID_LEN
        && value
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
    valid.then(|| value.to_string())
}

/// Returns the cached page, loading it from storage on first use. A page that was never
/// stored starts empty; any other storage failure is returned and nothing is cached, so
/// a later flush cannot overwrite data that failed to load.
pub async fn get_or_load_page(
    state: &AppState,
    page_id: &str,
) -> Result<Arc<RwLock<Page>>, StorageError> {
    if let Some(page) = state.pages.read().await.get(page_id).cloned() {
        return Ok(page);
    }
    let comments = match state.storage.load_page(page_id).await {
        Ok(data) => {
            let total = data.comments.len();
            let comments = sanitize_comments(data.comments);
            if comments.len() != total {
                tracing::warn!(
                    "dropped {} invalid comments from page {page_id}",
                    total - comments.len()
                );
            }
            tracing::info!("loaded page {page_id} ({} comments)", comments.len());
            comments
        }
        Err(StorageError::NotFound(_)) => {
            tracing::info!("creating page {page_id}");
            Vec::new()
        }
        Err(error) => return Err(error),
    };
    let page = Arc::new(RwLock::new(Page::new(comments)));
    let mut pages = state.pages.write().await;
    let entry = pages
        .entry(page_id.to_string())
        .or_insert_with(|| page.clone());
    Ok(entry.clone())
}

/// Writes every dirty page to storage. A page whose save fails stays dirty and is retried
/// on the next flush. Returns how many pages were written.
pub async fn flush_dirty_pages(state: &AppState) -> usize {
    let pages = {
        let pages = state.pages.read().await;
        pages
            .iter()
            .map(|(page_id, page)| (page_id.clone(), page.clone()))
            .collect::<Vec<_>>()
    };
    let mut written = 0;
    for (page_id, page) in pages {
        let snapshot = {
            let mut page = page.write().await;
            if !page.dirty {
                None
            } else {
                page.dirty = false;
                Some(CommentFileData {
                    comments: page.comments.clone(),
                })
            }
        };
        let Some(data) = snapshot else {
            continue;
        };
        match state.storage.save_page(&page_id, &data).await {
            Ok(()) => {
                tracing::debug!("flushed page {page_id} ({} comments)", data.comments.len());
                written += 1;
            }
            Err(error) => {
                tracing::error!("failed to save page {page_id}: {error}");
                page.write().await.dirty = true;
            }
        }
    }
    written
}
