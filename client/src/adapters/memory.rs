use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use notepin_shared::{Comment, CommentPatch};

use crate::adapter::{AdapterError, CommentAdapter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Save,
    Load,
    Update,
    Delete,
}

/// Keeps comments in process memory. Individual operations can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    comments: RefCell<Vec<Comment>>,
    failures: RefCell<HashMap<Operation, String>>,
    calls: RefCell<Vec<Operation>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comments(comments: Vec<Comment>) -> Self {
        Self {
            comments: RefCell::new(comments),
            ..Self::default()
        }
    }

    /// Makes every later call to `operation` fail with `message`.
    pub fn fail(&self, operation: Operation, message: impl Into<String>) {
        self.failures.borrow_mut().insert(operation, message.into());
    }

    pub fn recover(&self, operation: Operation) {
        self.failures.borrow_mut().remove(&operation);
    }

    pub fn stored(&self) -> Vec<Comment> {
        self.comments.borrow().clone()
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.calls.borrow().clone()
    }

    fn enter(&self, operation: Operation) -> Result<(), AdapterError> {
        self.calls.borrow_mut().push(operation);
        match self.failures.borrow().get(&operation) {
            Some(message) => Err(AdapterError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait(?Send)]
impl CommentAdapter for MemoryAdapter {
    async fn save(&self, comment: &Comment) -> Result<(), AdapterError> {
        self.enter(Operation::Save)?;
        self.comments.borrow_mut().push(comment.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Comment>, AdapterError> {
        self.enter(Operation::Load)?;
        Ok(self.comments.borrow().clone())
    }

    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<(), AdapterError> {
        self.enter(Operation::Update)?;
        if let Some(comment) = self
            .comments
            .borrow_mut()
            .iter_mut()
            .find(|comment| comment.id == id)
        {
            comment.apply(patch);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        self.enter(Operation::Delete)?;
        self.comments.borrow_mut().retain(|comment| comment.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            x: 1.0,
            y: 2.0,
            text: "t".into(),
            color: None,
            resolved: None,
            created_at: 1,
        }
    }

    #[test]
    fn stores_and_mutates_comments() {
        let adapter = MemoryAdapter::new();
        block_on(adapter.save(&comment("a"))).unwrap();
        block_on(adapter.save(&comment("b"))).unwrap();
        let patch = CommentPatch {
            resolved: Some(true),
            ..CommentPatch::default()
        };
        block_on(adapter.update("a", &patch)).unwrap();
        block_on(adapter.delete("b")).unwrap();
        let loaded = block_on(adapter.load()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].resolved, Some(true));
    }

    #[test]
    fn injected_failures_reject_until_recovered() {
        let adapter = MemoryAdapter::new();
        adapter.fail(Operation::Save, "disk full");
        let error = block_on(adapter.save(&comment("a"))).unwrap_err();
        assert_eq!(error.message(), "disk full");
        assert!(adapter.stored().is_empty());
        adapter.recover(Operation::Save);
        block_on(adapter.save(&comment("a"))).unwrap();
        assert_eq!(adapter.calls(), vec![Operation::Save, Operation::Save]);
    }
}
