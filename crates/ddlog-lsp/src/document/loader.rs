//! Loading DDlog files the editor has not opened.
//!
//! Import targets are read from disk on demand during resolution. Loaded
//! documents enter the session as `Closed` and are evicted once nothing
//! imports them any more.
//!
//! # Security
//!
//! - File size is capped (see [`MAX_FILE_SIZE`](crate::config::MAX_FILE_SIZE))
//! - Non-UTF8 files are rejected

use crate::error::{LspError, Result};
use ddlog_core::DDLOG_EXTENSION;
use std::path::Path;

/// Files above this size are loaded with a warning.
const LARGE_FILE_THRESHOLD: u64 = 1_000_000;

/// Returns true for paths with the `.dl` extension.
pub fn is_ddlog_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DDLOG_EXTENSION))
}

/// Reads a DDlog file from disk.
///
/// # Errors
///
/// - `LspError::FileTooLarge` - file exceeds `max_size`
/// - `LspError::Io` - not found, permission denied, not UTF-8, ...
///
/// # Examples
///
/// ```no_run
/// use ddlog_lsp::document::load_document_from_disk;
/// use std::path::Path;
///
/// # async fn example() -> ddlog_lsp::error::Result<()> {
/// let content = load_document_from_disk(Path::new("/ws/lib/graph.dl"), 1 << 20).await?;
/// println!("Loaded {} bytes", content.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_document_from_disk(path: &Path, max_size: u64) -> Result<String> {
    tracing::debug!("loading document from disk: {}", path.display());

    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        log_io_error(path, &e);
        LspError::Io(e)
    })?;

    let size = metadata.len();
    if size > max_size {
        tracing::error!(
            "document exceeds maximum size: {} bytes (limit: {} bytes)",
            size,
            max_size
        );
        return Err(LspError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max: max_size,
        });
    }
    if size > LARGE_FILE_THRESHOLD {
        tracing::warn!("document is large: {} bytes for {}", size, path.display());
    }

    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        log_io_error(path, &e);
        LspError::Io(e)
    })?;

    tracing::debug!(
        "loaded document: {} ({} bytes)",
        path.display(),
        content.len()
    );
    Ok(content)
}

fn log_io_error(path: &Path, error: &std::io::Error) {
    match error.kind() {
        std::io::ErrorKind::NotFound => {
            tracing::debug!("file not found: {}", path.display());
        }
        std::io::ErrorKind::PermissionDenied => {
            tracing::warn!("permission denied: {}", path.display());
        }
        _ => {
            tracing::error!("I/O error reading {}: {}", path.display(), error);
        }
    }
}
