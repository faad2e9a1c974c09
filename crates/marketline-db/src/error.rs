//! Database-specific error types and conversions.

use marketline_core::error::MarketError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row in {table}: {message}")]
    Decode { table: &'static str, message: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    pub(crate) fn decode(table: &'static str, message: impl ToString) -> Self {
        Self::Decode {
            table,
            message: message.to_string(),
        }
    }
}

impl From<DbError> for MarketError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => MarketError::NotFound { entity, id },
            other => MarketError::Database(other.to_string()),
        }
    }
}
