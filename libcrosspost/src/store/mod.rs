//! Content stores
//!
//! The store is written before any platform is contacted and read back by the
//! feed renderer. Stores are append-only: there is no update or delete.
//!
//! Backends:
//!
//! - [`supabase::SupabaseStore`]: PostgREST endpoint of a hosted Supabase project
//! - [`sqlite::SqliteStore`]: local SQLite database via sqlx
//! - [`memory::MemoryStore`]: in-process store for tests and dry runs

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::types::Post;

pub mod memory;
pub mod sqlite;
pub mod supabase;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short backend identifier used in logs
    fn name(&self) -> &str;

    /// Whether the store has everything it needs to accept writes
    fn is_configured(&self) -> bool;

    /// Append one post with `content` stored verbatim
    async fn save(&self, content: &str) -> Result<()>;

    /// Up to `limit` posts, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<Post>>;
}

/// Build the configured store backend
///
/// The SQLite backend opens (and migrates) its database here; the Supabase
/// backend performs no I/O until the first request.
pub async fn from_config(config: &Config) -> Result<Arc<dyn ContentStore>> {
    match config.store.backend {
        StoreBackend::Supabase => Ok(Arc::new(supabase::SupabaseStore::from_config(
            &config.store,
            &config.timeouts,
        )?)),
        StoreBackend::Sqlite => Ok(Arc::new(sqlite::SqliteStore::new(&config.store.path).await?)),
    }
}
