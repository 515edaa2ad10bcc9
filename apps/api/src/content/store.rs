//! Table-store access for portfolio content.
//!
//! Every query is "select all, order by column"; there are no writes. `AppState` holds
//! an `Arc<dyn ContentStore>` so handlers can be exercised without a database.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::errors::AppError;
use crate::models::content::{ImageRow, ProjectRow, VideoRow};

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// All images, newest title first.
    async fn images(&self) -> Result<Vec<ImageRow>, AppError>;

    /// All projects in display order.
    async fn projects(&self) -> Result<Vec<ProjectRow>, AppError>;

    /// The most recently added video, if any.
    async fn video(&self) -> Result<Option<VideoRow>, AppError>;
}

#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn images(&self) -> Result<Vec<ImageRow>, AppError> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r#"SELECT * FROM "imageData" ORDER BY img_title DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        debug!(count = rows.len(), "loaded images");
        Ok(rows)
    }

    async fn projects(&self) -> Result<Vec<ProjectRow>, AppError> {
        let rows =
            sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects ORDER BY position ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;
        debug!(count = rows.len(), "loaded projects");
        Ok(rows)
    }

    async fn video(&self) -> Result<Option<VideoRow>, AppError> {
        let row = sqlx::query_as::<_, VideoRow>(
            "SELECT * FROM videos ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Store backed by fixed rows, already in query order.
    #[derive(Default)]
    pub struct MemoryContentStore {
        pub images: Vec<ImageRow>,
        pub projects: Vec<ProjectRow>,
        pub video: Option<VideoRow>,
    }

    #[async_trait]
    impl ContentStore for MemoryContentStore {
        async fn images(&self) -> Result<Vec<ImageRow>, AppError> {
            Ok(self.images.clone())
        }

        async fn projects(&self) -> Result<Vec<ProjectRow>, AppError> {
            Ok(self.projects.clone())
        }

        async fn video(&self) -> Result<Option<VideoRow>, AppError> {
            Ok(self.video.clone())
        }
    }
}
