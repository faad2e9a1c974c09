//! Marketline Core — domain models, repository traits and error types
//! shared by every Marketline crate.
//!
//! Nothing in here touches storage or the request path directly; the
//! database crate implements the repository traits and the gate crate
//! consumes them.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{MarketError, MarketResult};
