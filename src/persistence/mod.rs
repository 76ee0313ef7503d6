//! Persistence layer: SQLite fact table and dimension lookups.
//!
//! Provides the [`Store`] handle for schema bootstrap, idempotent
//! dimension resolution, and the per-cycle transactional fact writes.

pub mod store;

pub use store::{Dimension, Store};
