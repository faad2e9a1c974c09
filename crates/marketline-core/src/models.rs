//! Domain models for Marketline.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod client;
pub mod metric;
pub mod plan;
pub mod shop;
