use std::path::Path;
use std::time::SystemTime;

use crate::error::ServeError;

/// Filesystem facts about a served path, captured by a single `stat`
/// before the response is composed.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, later emitted as an HTTP-date.
    pub modified: SystemTime,
    /// True for regular files. Non-regular bodies (pipes, devices)
    /// advertise their full stat size regardless of any range.
    pub is_regular_file: bool,
    /// True for directories, which are listed rather than streamed.
    pub is_directory: bool,
}

impl FileMetadata {
    /// Stat `path`, following symlinks. A missing path surfaces as
    /// [`ServeError::NotFound`]; other failures are I/O faults.
    pub async fn resolve(path: impl AsRef<Path>) -> Result<Self, ServeError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(ServeError::from_io)?;
        let modified = meta.modified().map_err(ServeError::Io)?;

        Ok(FileMetadata {
            size: meta.len(),
            modified,
            is_regular_file: meta.is_file(),
            is_directory: meta.is_dir(),
        })
    }
}
