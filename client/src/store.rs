use std::collections::HashSet;

use notepin_shared::{validate_position, Comment, CommentPatch};

/// Authoritative comment cache, kept in insertion order.
#[derive(Debug, Default)]
pub struct CommentStore {
    comments: Vec<Comment>,
}

impl CommentStore {
    pub fn as_slice(&self) -> &[Comment] {
        &self.comments
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|comment| comment.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn insert(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    pub fn remove(&mut self, id: &str) -> Option<Comment> {
        let index = self.comments.iter().position(|comment| comment.id == id)?;
        Some(self.comments.remove(index))
    }

    /// Merges `patch` into the comment and returns it as it was before and after.
    pub fn apply(&mut self, id: &str, patch: &CommentPatch) -> Option<(Comment, Comment)> {
        let comment = self.comments.iter_mut().find(|comment| comment.id == id)?;
        let before = comment.clone();
        comment.apply(patch);
        Some((before, comment.clone()))
    }

    /// Copies of every cached comment; mutating them never touches the cache.
    pub fn snapshot(&self) -> Vec<Comment> {
        self.comments.clone()
    }

    pub fn clear(&mut self) {
        self.comments.clear();
    }

    /// Replaces the cache with adapter output. Entries with out-of-range coordinates or a
    /// repeated id are dropped; returns how many were dropped.
    pub fn load(&mut self, loaded: Vec<Comment>) -> usize {
        self.comments.clear();
        let mut seen = HashSet::new();
        let mut skipped = 0;
        for comment in loaded {
            if let Err(error) = validate_position(comment.x, comment.y) {
                log::warn!("skipping stored comment {}: {error}", comment.id);
                skipped += 1;
                continue;
            }
            if !seen.insert(comment.id.clone()) {
                log::warn!("skipping stored comment with duplicate id {}", comment.id);
                skipped += 1;
                continue;
            }
            self.comments.push(comment);
        }
        skipped
    }
}
