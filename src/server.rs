//! Database file server.
//!
//! Two endpoints: an unauthenticated liveness check and an
//! authenticated download of the database file, packaged as a zip
//! archive on each request. The ingestion pipeline has no dependency on
//! this component beyond writing to the same file path.

use std::io::{Cursor, Write as _};

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::app_state::ServerState;
use crate::error::TrackerError;

/// Builds the file-server router.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/{file}", get(download_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /health` — liveness endpoint, no authentication.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// `GET /{file}` — authenticated database download.
///
/// Responds 401 with a Basic challenge on missing or wrong credentials,
/// 404 when the path is not the configured archive name or the database
/// file does not exist yet, and otherwise streams a freshly built zip
/// archive containing the database file.
async fn download_handler(
    State(state): State<ServerState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Response, TrackerError> {
    if !is_authorized(&headers, &state.expected_authorization) {
        return Ok(unauthorized());
    }

    if file != state.archive_name {
        return Ok((StatusCode::NOT_FOUND, "File not found").into_response());
    }

    let db_bytes = match tokio::fs::read(&state.db_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let message = format!("Database file not found: {}", state.db_path.display());
            return Ok((StatusCode::NOT_FOUND, message).into_response());
        }
        Err(source) => {
            return Err(TrackerError::Io {
                path: state.db_path.clone(),
                source,
            });
        }
    };

    let entry_name = state
        .db_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("database.db")
        .to_string();
    let archive = tokio::task::spawn_blocking(move || build_archive(&entry_name, &db_bytes))
        .await
        .map_err(|e| TrackerError::Archive(e.to_string()))??;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", state.archive_name),
        )
        .body(Body::from(archive))
        .map_err(|e| TrackerError::Archive(e.to_string()))?;
    Ok(response)
}

/// Compares the `Authorization` header against the precomputed value.
fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

/// 401 response carrying the Basic challenge.
fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"DB File Server\"")],
        "Authentication required.",
    )
        .into_response()
}

/// Deflate-zips the database bytes into a single-entry archive.
fn build_archive(entry_name: &str, bytes: &[u8]) -> Result<Vec<u8>, TrackerError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    writer
        .start_file(entry_name, options)
        .map_err(|e| TrackerError::Archive(e.to_string()))?;
    writer
        .write_all(bytes)
        .map_err(|e| TrackerError::Archive(e.to_string()))?;
    let cursor = writer
        .finish()
        .map_err(|e| TrackerError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}
