use std::collections::HashSet;

use notepin_shared::{validate_comment, validate_position, validate_text, Comment, CommentPatch};

use crate::error::ApiError;
use crate::state::{Page, MAX_COMMENTS_PER_PAGE, MAX_ID_LEN, MAX_TEXT_LEN};

const MAX_COLOR_LEN: usize = 32;

/// Drops stored comments that would be rejected on insert, keeping the first of any
/// repeated id.
pub fn sanitize_comments(comments: Vec<Comment>) -> Vec<Comment> {
    let mut seen = HashSet::new();
    comments
        .into_iter()
        .filter_map(sanitize_comment)
        .filter(|comment| seen.insert(comment.id.clone()))
        .take(MAX_COMMENTS_PER_PAGE)
        .collect()
}

fn sanitize_comment(mut comment: Comment) -> Option<Comment> {
    if !valid_id(&comment.id) || validate_comment(&comment).is_err() {
        return None;
    }
    comment.color = sanitize_color(comment.color);
    if comment.text.chars().count() > MAX_TEXT_LEN {
        comment.text = comment.text.chars().take(MAX_TEXT_LEN).collect();
    }
    Some(comment)
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LEN
}

fn sanitize_color(color: Option<String>) -> Option<String> {
    let mut color = color?;
    if color.trim().is_empty() {
        return None;
    }
    if color.len() > MAX_COLOR_LEN {
        let mut end = MAX_COLOR_LEN;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
    Some(color)
}

fn check_text(text: &str) -> Result<(), ApiError> {
    validate_text(text)?;
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::TextTooLong(MAX_TEXT_LEN));
    }
    Ok(())
}

pub fn insert_comment(page: &mut Page, mut comment: Comment) -> Result<Comment, ApiError> {
    if !valid_id(&comment.id) {
        return Err(ApiError::InvalidId);
    }
    validate_position(comment.x, comment.y)?;
    check_text(&comment.text)?;
    if page.comments.iter().any(|existing| existing.id == comment.id) {
        return Err(ApiError::Duplicate(comment.id));
    }
    if page.comments.len() >= MAX_COMMENTS_PER_PAGE {
        return Err(ApiError::PageFull(MAX_COMMENTS_PER_PAGE));
    }
    comment.color = sanitize_color(comment.color);
    page.comments.push(comment.clone());
    page.dirty = true;
    Ok(comment)
}

pub fn update_comment(
    page: &mut Page,
    id: &str,
    mut patch: CommentPatch,
) -> Result<Comment, ApiError> {
    let Some(index) = page.comments.iter().position(|comment| comment.id == id) else {
        return Err(ApiError::NotFound(id.to_string()));
    };
    let current = &page.comments[index];
    if patch.touches_position() {
        validate_position(
            patch.x.unwrap_or(current.x),
            patch.y.unwrap_or(current.y),
        )?;
    }
    if let Some(text) = &patch.text {
        check_text(text)?;
    }
    if patch.color.is_some() {
        patch.color = sanitize_color(patch.color);
    }
    if patch.is_empty() {
        return Ok(current.clone());
    }
    let comment = &mut page.comments[index];
    comment.apply(&patch);
    let updated = comment.clone();
    page.dirty = true;
    Ok(updated)
}

pub fn delete_comment(page: &mut Page, id: &str) -> Result<Comment, ApiError> {
    let Some(index) = page.comments.iter().position(|comment| comment.id == id) else {
        return Err(ApiError::NotFound(id.to_string()));
    };
    page.dirty = true;
    Ok(page.comments.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notepin_shared::ValidationError;
    use pretty_assertions::assert_eq;

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            x: 25.0,
            y: 75.0,
            text: "check spacing".into(),
            color: None,
            resolved: None,
            created_at: 10,
        }
    }

    #[test]
    fn insert_marks_the_page_dirty() {
        let mut page = Page::default();
        let stored = insert_comment(&mut page, comment("a")).unwrap();
        assert_eq!(stored, comment("a"));
        assert_eq!(page.comments, vec![comment("a")]);
        assert!(page.dirty);
    }

    #[test]
    fn insert_rejects_bad_input() {
        let mut page = Page::default();
        let mut outside = comment("a");
        outside.x = 101.0;
        assert!(matches!(
            insert_comment(&mut page, outside),
            Err(ApiError::Invalid(ValidationError::CoordinateOutOfRange { axis: 'x', .. }))
        ));
        let mut blank = comment("b");
        blank.text = " ".into();
        assert!(matches!(
            insert_comment(&mut page, blank),
            Err(ApiError::Invalid(ValidationError::EmptyText))
        ));
        assert!(matches!(
            insert_comment(&mut page, comment("")),
            Err(ApiError::InvalidId)
        ));
        let mut long = comment("c");
        long.text = "x".repeat(MAX_TEXT_LEN + 1);
        assert!(matches!(
            insert_comment(&mut page, long),
            Err(ApiError::TextTooLong(_))
        ));
        assert!(page.comments.is_empty());
        assert!(!page.dirty);
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut page = Page::new(vec![comment("a")]);
        assert!(matches!(
            insert_comment(&mut page, comment("a")),
            Err(ApiError::Duplicate(id)) if id == "a"
        ));
        assert_eq!(page.comments.len(), 1);
    }

    #[test]
    fn update_merges_fields() {
        let mut page = Page::new(vec![comment("a")]);
        let patch = CommentPatch {
            text: Some("done".into()),
            resolved: Some(true),
            ..CommentPatch::default()
        };
        let updated = update_comment(&mut page, "a", patch).unwrap();
        assert_eq!(updated.text, "done");
        assert_eq!(updated.resolved, Some(true));
        assert_eq!(updated.x, 25.0);
        assert_eq!(page.comments[0], updated);
        assert!(page.dirty);
    }

    #[test]
    fn update_validates_the_merged_position() {
        let mut page = Page::new(vec![comment("a")]);
        let patch = CommentPatch {
            y: Some(-3.0),
            ..CommentPatch::default()
        };
        assert!(matches!(
            update_comment(&mut page, "a", patch),
            Err(ApiError::Invalid(_))
        ));
        assert_eq!(page.comments[0], comment("a"));
        assert!(!page.dirty);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut page = Page::new(vec![comment("a")]);
        let updated = update_comment(&mut page, "a", CommentPatch::default()).unwrap();
        assert_eq!(updated, comment("a"));
        assert!(!page.dirty);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut page = Page::default();
        assert!(matches!(
            update_comment(&mut page, "x", CommentPatch::default()),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            delete_comment(&mut page, "x"),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn delete_removes_the_comment() {
        let mut page = Page::new(vec![comment("a"), comment("b")]);
        let removed = delete_comment(&mut page, "a").unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(page.comments, vec![comment("b")]);
        assert!(page.dirty);
    }

    #[test]
    fn sanitize_drops_invalid_and_repeated_entries() {
        let mut outside = comment("b");
        outside.y = 140.0;
        let mut colored = comment("c");
        colored.color = Some("#".repeat(40));
        let cleaned = sanitize_comments(vec![comment("a"), outside, comment("a"), colored]);
        let ids: Vec<&str> = cleaned.iter().map(|comment| comment.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(cleaned[1].color.as_deref().map(str::len), Some(MAX_COLOR_LEN));
    }
}
