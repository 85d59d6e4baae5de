//! Writing the finished sticker to disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Errors while saving a sticker.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The sticker file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// `sticker_<millis>.png`, where `millis` is milliseconds since the Unix
/// epoch.
#[must_use]
pub fn default_filename(millis: i64) -> String {
    format!("sticker_{millis}.png")
}

/// Destination for the sticker: `output` if given, otherwise a
/// timestamped name in the working directory.
#[must_use]
pub fn destination(output: Option<&Path>, now: DateTime<Utc>) -> PathBuf {
    output.map_or_else(
        || PathBuf::from(default_filename(now.timestamp_millis())),
        Path::to_path_buf,
    )
}

/// Write `png` to `path`.
///
/// # Errors
///
/// Returns [`ExportError::Write`] if the file cannot be written.
pub fn save(path: &Path, png: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, png).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("wrote {} ({} bytes)", path.display(), png.len());
    Ok(())
}
