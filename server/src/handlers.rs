use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use notepin_shared::{Comment, CommentPatch};

use crate::error::ApiError;
use crate::logic;
use crate::pages::{get_or_load_page, normalize_page_id};
use crate::state::AppState;

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

fn page_id(value: &str) -> Result<String, ApiError> {
    normalize_page_id(value).ok_or(ApiError::UnknownPage)
}

pub async fn list_comments(
    Path(page_id_raw): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let page_id = page_id(&page_id_raw)?;
    let page = get_or_load_page(&state, &page_id).await?;
    let comments = page.read().await.comments.clone();
    Ok(Json(comments))
}

pub async fn create_comment(
    Path(page_id_raw): Path<String>,
    State(state): State<AppState>,
    Json(comment): Json<Comment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let page_id = page_id(&page_id_raw)?;
    let page = get_or_load_page(&state, &page_id).await?;
    let stored = logic::insert_comment(&mut *page.write().await, comment)?;
    tracing::debug!("page {page_id}: created comment {}", stored.id);
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update_comment(
    Path((page_id_raw, comment_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(patch): Json<CommentPatch>,
) -> Result<StatusCode, ApiError> {
    let page_id = page_id(&page_id_raw)?;
    let page = get_or_load_page(&state, &page_id).await?;
    logic::update_comment(&mut *page.write().await, &comment_id, patch)?;
    tracing::debug!("page {page_id}: updated comment {comment_id}");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_comment(
    Path((page_id_raw, comment_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let page_id = page_id(&page_id_raw)?;
    let page = get_or_load_page(&state, &page_id).await?;
    logic::delete_comment(&mut *page.write().await, &comment_id)?;
    tracing::debug!("page {page_id}: deleted comment {comment_id}");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pages::flush_dirty_pages;
    use crate::storage::{FileStorage, Storage};
    use pretty_assertions::assert_eq;

    fn state(dir: &tempfile::TempDir) -> AppState {
        AppState::new(Arc::new(FileStorage::new(dir.path().to_path_buf())))
    }

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            x: 40.0,
            y: 60.0,
            text: "move this".into(),
            color: None,
            resolved: None,
            created_at: 5,
        }
    }

    async fn create(state: &AppState, page: &str, comment: Comment) -> StatusCode {
        create_comment(Path(page.to_string()), State(state.clone()), Json(comment))
            .await
            .into_response()
            .status()
    }

    #[tokio::test]
    async fn create_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);

        assert_eq!(create(&state, "home", comment("a")).await, StatusCode::CREATED);
        assert_eq!(create(&state, "home", comment("a")).await, StatusCode::CONFLICT);

        let Json(listed) = list_comments(Path("home".into()), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(listed, vec![comment("a")]);
    }

    #[tokio::test]
    async fn invalid_page_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        assert_eq!(
            create(&state, "not a page", comment("a")).await,
            StatusCode::NOT_FOUND
        );
        let status = list_comments(Path("..".into()), State(state.clone()))
            .await
            .into_response()
            .status();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_comments_are_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let mut outside = comment("a");
        outside.x = 120.0;
        assert_eq!(create(&state, "home", outside).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        create(&state, "home", comment("a")).await;

        let patch = CommentPatch {
            resolved: Some(true),
            ..CommentPatch::default()
        };
        let status = update_comment(
            Path(("home".into(), "a".into())),
            State(state.clone()),
            Json(patch.clone()),
        )
        .await
        .into_response()
        .status();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let status = update_comment(
            Path(("home".into(), "zzz".into())),
            State(state.clone()),
            Json(patch),
        )
        .await
        .into_response()
        .status();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let status = delete_comment(Path(("home".into(), "a".into())), State(state.clone()))
            .await
            .into_response()
            .status();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let status = delete_comment(Path(("home".into(), "a".into())), State(state.clone()))
            .await
            .into_response()
            .status();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn flushed_comments_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let first = state(&dir);
        create(&first, "home", comment("a")).await;
        assert_eq!(flush_dirty_pages(&first).await, 1);

        let second = state(&dir);
        let Json(listed) = list_comments(Path("home".into()), State(second))
            .await
            .unwrap();
        assert_eq!(listed, vec![comment("a")]);

        let stored = FileStorage::new(dir.path().to_path_buf())
            .load_page("home")
            .await
            .unwrap();
        assert_eq!(stored.comments.len(), 1);
    }
}
