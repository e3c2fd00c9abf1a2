//! Error types module
//!
//! All errors in the pipeline are unified under the `AppError` enum which
//! can represent database, storage, conversion, and rendering failures.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the
//! `sqlx` feature so the models can be used without pulling in a database
//! driver.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conversion failed during {stage}: {detail}")]
    ConversionFailed { stage: String, detail: String },

    #[error("Rendering failed on page {page}: {detail}")]
    RenderFailed { page: u32, detail: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn conversion(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::ConversionFailed {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    pub fn render(page: u32, detail: impl Into<String>) -> Self {
        AppError::RenderFailed {
            page,
            detail: detail.into(),
        }
    }

    /// True for the quiet-abort case: the referenced team/document/version
    /// or source object no longer exists and the stage should log and
    /// return without surfacing an error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("row not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_quiet_abort() {
        let err = AppError::NotFound("version 123".to_string());
        assert!(err.is_not_found());

        let err = AppError::Storage("bucket unreachable".to_string());
        assert!(!err.is_not_found());
    }

    #[test]
    fn conversion_error_carries_stage() {
        let err = AppError::conversion("submit", "upstream returned 400");
        assert_eq!(
            err.to_string(),
            "Conversion failed during submit: upstream returned 400"
        );
    }

    #[test]
    fn render_error_carries_page() {
        let err = AppError::render(3, "bitmap allocation failed");
        assert_eq!(
            err.to_string(),
            "Rendering failed on page 3: bitmap allocation failed"
        );
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
    }
}
