use chrono::{DateTime, Utc};
use papermill_core::models::{Document, DocumentVersion};
use papermill_core::AppError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::versions::VersionRow;

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    team_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            team_id: row.team_id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Read access to documents and their version collections.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, team_id, name, created_at, updated_at FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Document::from))
    }

    /// All versions of a document, newest first.
    pub async fn list_versions(&self, document_id: Uuid) -> Result<Vec<DocumentVersion>, AppError> {
        let rows = sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM document_versions WHERE document_id = $1 ORDER BY version_number DESC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(VersionRow::into_domain).collect()
    }
}
