//! Shared state injected into the file-server handlers.

use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::config::TrackerConfig;

/// State available to all file-server handlers via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Path of the SQLite database file being served.
    pub db_path: PathBuf,
    /// Request path (and download filename) of the zipped database.
    pub archive_name: String,
    /// Precomputed `Basic <credentials>` header value requests must match.
    pub expected_authorization: String,
}

impl ServerState {
    /// Builds the server state from configuration, precomputing the
    /// expected Basic-auth header value.
    #[must_use]
    pub fn new(config: &TrackerConfig) -> Self {
        let credentials = format!("{}:{}", config.file_server_user, config.file_server_pass);
        Self {
            db_path: config.db_path.clone(),
            archive_name: config.archive_name.clone(),
            expected_authorization: format!("Basic {}", STANDARD.encode(credentials)),
        }
    }
}
