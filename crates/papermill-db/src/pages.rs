use std::str::FromStr;

use chrono::{DateTime, Utc};
use papermill_core::models::{DocumentPage, LinkAnnotation, NewDocumentPage, RenderMetrics};
use papermill_core::{AppError, StorageBackend};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct PageRow {
    id: Uuid,
    version_id: Uuid,
    page_number: i32,
    image_key: String,
    storage_backend: String,
    links: serde_json::Value,
    render: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl PageRow {
    fn into_domain(self) -> Result<DocumentPage, AppError> {
        let storage_backend = StorageBackend::from_str(&self.storage_backend)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        let links: Vec<LinkAnnotation> = serde_json::from_value(self.links)?;
        let render: RenderMetrics = serde_json::from_value(self.render)?;
        Ok(DocumentPage {
            id: self.id,
            version_id: self.version_id,
            page_number: self.page_number,
            image_key: self.image_key,
            storage_backend,
            links,
            render,
            created_at: self.created_at,
        })
    }
}

/// Append-only access to rendered page records.
#[derive(Clone)]
pub struct PageRepository {
    pool: PgPool,
}

impl PageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_version_and_number(
        &self,
        version_id: Uuid,
        page_number: i32,
    ) -> Result<Option<DocumentPage>, AppError> {
        let row = sqlx::query_as::<_, PageRow>(
            "SELECT * FROM document_pages WHERE version_id = $1 AND page_number = $2",
        )
        .bind(version_id)
        .bind(page_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PageRow::into_domain).transpose()
    }

    /// Insert a page record, deferring to any existing row.
    ///
    /// The unique index on `(version_id, page_number)` is the arbiter: on
    /// conflict nothing is written and the surviving row is re-read, so a
    /// concurrent duplicate render costs wasted work, never a second row.
    pub async fn create(&self, page: NewDocumentPage) -> Result<DocumentPage, AppError> {
        let links = serde_json::to_value(&page.links)?;
        let render = serde_json::to_value(page.render)?;

        let inserted = sqlx::query_as::<_, PageRow>(
            "INSERT INTO document_pages
                 (version_id, page_number, image_key, storage_backend, links, render)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (version_id, page_number) DO NOTHING
             RETURNING *",
        )
        .bind(page.version_id)
        .bind(page.page_number)
        .bind(&page.image_key)
        .bind(page.storage_backend.to_string())
        .bind(links)
        .bind(render)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => row.into_domain(),
            None => {
                tracing::debug!(
                    version_id = %page.version_id,
                    page_number = page.page_number,
                    "Page already exists, returning existing record"
                );
                self.find_by_version_and_number(page.version_id, page.page_number)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "page ({}, {}) conflicted on insert but is missing on re-read",
                            page.version_id, page.page_number
                        ))
                    })
            }
        }
    }
}
