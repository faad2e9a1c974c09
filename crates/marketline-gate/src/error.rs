//! Gate error types.

use marketline_core::error::MarketError;
use thiserror::Error;

use crate::rejection::Rejection;

#[derive(Debug, Error)]
pub enum GateError {
    /// A gating step ended the request with a terminal response.
    #[error("request rejected: {0}")]
    Rejected(Rejection),

    /// A data-store read needed for gating failed.
    #[error(transparent)]
    Store(#[from] MarketError),

    #[error("invalid configuration for {var}: {message}")]
    Config { var: String, message: String },
}

impl GateError {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GateError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

impl From<Rejection> for GateError {
    fn from(rejection: Rejection) -> Self {
        GateError::Rejected(rejection)
    }
}

/// Outcome of [`Gateway::handle`](crate::pipeline::Gateway::handle) when
/// the request did not succeed.
///
/// Handler errors are passed through untouched.
#[derive(Debug, Error)]
pub enum PipelineError<E> {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("handler failed: {0}")]
    Handler(E),
}

impl<E> PipelineError<E> {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            PipelineError::Gate(err) => err.rejection(),
            PipelineError::Handler(_) => None,
        }
    }

    pub fn into_handler_error(self) -> Option<E> {
        match self {
            PipelineError::Handler(err) => Some(err),
            PipelineError::Gate(_) => None,
        }
    }
}
