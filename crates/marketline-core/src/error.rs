//! Error types for the Marketline system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
