use std::str::FromStr;

use chrono::{DateTime, Utc};
use papermill_core::models::{DocumentKind, DocumentVersion};
use papermill_core::{AppError, StorageBackend};
use sqlx::PgPool;
use uuid::Uuid;

/// Raw version row; `kind` and `storage_backend` are stored as text and
/// parsed into their closed enums on the way out.
#[derive(sqlx::FromRow)]
pub(crate) struct VersionRow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_number: i32,
    pub kind: String,
    pub file_key: String,
    pub original_file_key: String,
    pub storage_backend: String,
    pub content_type: String,
    pub file_size: i64,
    pub num_pages: Option<i32>,
    pub has_pages: bool,
    pub is_primary: bool,
    pub is_vertical: bool,
    pub duration_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VersionRow {
    pub(crate) fn into_domain(self) -> Result<DocumentVersion, AppError> {
        let kind = DocumentKind::from_str(&self.kind)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        let storage_backend = StorageBackend::from_str(&self.storage_backend)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        Ok(DocumentVersion {
            id: self.id,
            document_id: self.document_id,
            version_number: self.version_number,
            kind,
            file_key: self.file_key,
            original_file_key: self.original_file_key,
            storage_backend,
            content_type: self.content_type,
            file_size: self.file_size,
            num_pages: self.num_pages,
            has_pages: self.has_pages,
            is_primary: self.is_primary,
            is_vertical: self.is_vertical,
            duration_secs: self.duration_secs,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Typed read/update access to version records.
#[derive(Clone)]
pub struct VersionRepository {
    pool: PgPool,
}

impl VersionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<DocumentVersion>, AppError> {
        let row = sqlx::query_as::<_, VersionRow>("SELECT * FROM document_versions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(VersionRow::into_domain).transpose()
    }

    /// Point the version at a new canonical file. Converters call this
    /// after persisting their output.
    pub async fn update_file(
        &self,
        id: Uuid,
        file_key: &str,
        kind: DocumentKind,
        backend: StorageBackend,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE document_versions
             SET file_key = $2, kind = $3, storage_backend = $4, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(file_key)
        .bind(kind.as_str())
        .bind(backend.to_string())
        .execute(&self.pool)
        .await?;

        tracing::info!(version_id = %id, kind = %kind, "Version file reference updated");
        Ok(())
    }

    pub async fn set_duration(&self, id: Uuid, duration_secs: f64) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE document_versions SET duration_secs = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(duration_secs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_orientation(&self, id: Uuid, is_vertical: bool) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE document_versions SET is_vertical = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(is_vertical)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a fully rasterized version as the document's primary one.
    ///
    /// Sets page count and flags on the version, then demotes every
    /// sibling version of the same document, all in one transaction so a
    /// document never ends up with zero or two primary versions.
    pub async fn finalize_pages(&self, id: Uuid, num_pages: i32) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let document_id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE document_versions
             SET num_pages = $2, has_pages = TRUE, is_primary = TRUE, updated_at = now()
             WHERE id = $1
             RETURNING document_id",
        )
        .bind(id)
        .bind(num_pages)
        .fetch_optional(&mut *tx)
        .await?;

        let document_id = document_id
            .ok_or_else(|| AppError::NotFound(format!("version {} for finalize", id)))?;

        sqlx::query(
            "UPDATE document_versions
             SET is_primary = FALSE, updated_at = now()
             WHERE document_id = $1 AND id <> $2 AND is_primary",
        )
        .bind(document_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            version_id = %id,
            document_id = %document_id,
            num_pages = num_pages,
            "Version finalized as primary"
        );
        Ok(())
    }
}
