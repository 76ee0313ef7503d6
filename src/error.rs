//! Central error type for the tracker.
//!
//! [`TrackerError`] covers every failure mode of the ingestion cycle and
//! the supporting components. No variant escapes the cycle boundary at
//! runtime (the scheduler catches and logs all of them), but setup
//! failures such as configuration or schema bootstrap propagate out of
//! `main`.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Server-side error enum for the ingestion pipeline and file server.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Upstream fetch failed: transport error, timeout, or non-success
    /// HTTP status.
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The snapshot creation timestamp could not be interpreted.
    #[error("invalid snapshot timestamp: {0}")]
    Timestamp(String),

    /// Database failure from the persistence layer.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Filesystem failure (schema script, database path).
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Path the operation was acting on.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Packaging the database file into an archive failed.
    #[error("archive packaging failed: {0}")]
    Archive(String),
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
