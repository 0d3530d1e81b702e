//! SQLite store backend

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::error::{Result, StoreError};
use crate::store::ContentStore;
use crate::types::Post;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) and migrate the database at `db_path`
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // mode=rwc creates the file on first use
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));
        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running migrations on it
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn save(&self, content: &str) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO posts (id, content, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(content)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        tracing::debug!(post_id = %id, "Stored post");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, created_at
            FROM posts
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter()
            .map(|r| {
                Ok(Post {
                    id: r.try_get("id").map_err(StoreError::SqlxError)?,
                    content: r.try_get("content").map_err(StoreError::SqlxError)?,
                    created_at: r.try_get("created_at").map_err(StoreError::SqlxError)?,
                })
            })
            .collect()
    }
}
