//! Papermill metadata store adapter
//!
//! Typed read/update repositories over Postgres for documents, versions,
//! and rendered pages. No business logic lives here; the pipeline decides
//! what to write, this crate only knows how.

pub mod documents;
pub mod pages;
pub mod versions;

pub use documents::DocumentRepository;
pub use pages::PageRepository;
pub use versions::VersionRepository;

/// Run embedded migrations against the given pool.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
