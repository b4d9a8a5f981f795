//! Product image uploads.
//!
//! Files are accepted by extension, renamed to a sanitized name behind a
//! random prefix, and written to the upload directory under the static root.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Extensions accepted for product images (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// URL prefix under which uploads are served.
pub const UPLOAD_URL_PREFIX: &str = "/static/uploads";

/// Stem used when nothing of the client's filename survives sanitizing.
const FALLBACK_STEM: &str = "image";

/// Errors that can occur while storing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The file extension is not an accepted image type.
    #[error("file type not allowed: {0}")]
    DisallowedExtension(String),

    /// Filesystem error.
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether `filename` carries an accepted image extension.
#[must_use]
pub fn allowed_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Directory components are dropped, whitespace becomes `_`, and anything
/// other than ASCII letters, digits, `.`, `-` and `_` is removed. Leading
/// dots are stripped so the result is never hidden or relative.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = basename
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    cleaned.trim_start_matches(['.', '_']).to_owned()
}

/// Validate and store an uploaded image. Returns its public path.
///
/// # Errors
///
/// Returns `UploadError::DisallowedExtension` if the extension is not accepted.
/// Returns `UploadError::Io` if the file cannot be written.
pub async fn save_image(
    upload_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<String, UploadError> {
    if !allowed_file(filename) {
        return Err(UploadError::DisallowedExtension(filename.to_owned()));
    }

    let mut sanitized = sanitize_filename(filename);
    if !allowed_file(&sanitized) {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        sanitized = format!("{FALLBACK_STEM}.{extension}");
    }
    let stored_name = format!("{}_{sanitized}", Uuid::new_v4().simple());

    tokio::fs::create_dir_all(upload_dir).await?;
    tokio::fs::write(upload_dir.join(&stored_name), bytes).await?;

    info!(file = %stored_name, size = bytes.len(), "Product image stored");
    Ok(format!("{UPLOAD_URL_PREFIX}/{stored_name}"))
}

/// Delete an image previously returned by [`save_image`].
///
/// Paths outside the upload prefix are ignored. Failures are logged, not
/// returned.
pub async fn remove_image(upload_dir: &Path, public_path: &str) {
    let Some(stored_name) = public_path
        .strip_prefix(UPLOAD_URL_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|name| !name.is_empty() && sanitize_filename(name) == *name)
    else {
        return;
    };

    match tokio::fs::remove_file(upload_dir.join(stored_name)).await {
        Ok(()) => info!(file = %stored_name, "Product image removed"),
        Err(e) => warn!(file = %stored_name, error = %e, "Failed to remove product image"),
    }
}
