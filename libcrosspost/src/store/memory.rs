//! In-process store
//!
//! Append-only and lost on restart. Used by tests and by the server's
//! `--dry-run` mode, where nothing should leave the process.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Result, StoreError};
use crate::store::ContentStore;
use crate::types::Post;

#[derive(Clone, Default)]
pub struct MemoryStore {
    posts: Arc<Mutex<Vec<Post>>>,
    failure: Option<String>,
    save_call_count: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails with `StoreError::Unavailable`
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Seed a post with an explicit timestamp
    pub fn insert(&self, post: Post) {
        self.posts.lock().unwrap().push(post);
    }

    pub fn save_call_count(&self) -> usize {
        *self.save_call_count.lock().unwrap()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(reason) => Err(StoreError::Unavailable(reason.clone()).into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn save(&self, content: &str) -> Result<()> {
        *self.save_call_count.lock().unwrap() += 1;
        self.check()?;

        self.insert(Post {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Post>> {
        self.check()?;

        let mut posts = self.posts();
        // equal timestamps come out newest-inserted first
        posts.sort_by_key(|p| p.created_at);
        posts.reverse();
        posts.truncate(limit);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrosspostError;
    use chrono::Duration;

    #[tokio::test]
    async fn test_save_then_recent() {
        let store = MemoryStore::new();
        store.save("one").await.unwrap();
        store.save("two").await.unwrap();

        let posts = store.recent(10).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].content, "two");
        assert_eq!(store.save_call_count(), 2);
    }

    #[tokio::test]
    async fn test_recent_orders_by_timestamp_not_insertion() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (i, offset) in [5i64, 1, 3].iter().enumerate() {
            store.insert(Post {
                id: i.to_string(),
                content: format!("{} minutes ago", offset),
                created_at: now - Duration::minutes(*offset),
            });
        }

        let posts = store.recent(2).await.unwrap();
        let contents: Vec<&str> = posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["1 minutes ago", "3 minutes ago"]);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MemoryStore::failing("disk full");

        let result = store.save("x").await;
        assert!(matches!(
            result,
            Err(CrosspostError::Store(StoreError::Unavailable(ref reason))) if reason == "disk full"
        ));
        assert_eq!(store.save_call_count(), 1);
        assert!(store.posts().is_empty());
        assert!(store.recent(10).await.is_err());
    }
}
