//! # axum-byteserve
//!
//! Resumable file downloads for [`axum`][1]: `Range` header parsing,
//! chunked file streaming, and the download header set browsers and
//! download managers expect.
//!
//! [`FileServer`] is the front door. Point it at a directory, hand it
//! the request path and raw `Range` header, and turn the outcome into
//! a response. Resumed downloads always run from the requested start
//! offset to end of file, so an interrupted client can pick up where
//! it stopped with a single open-ended range.
//!
//! ```
//! use axum::extract::Path;
//! use axum::http::{header, HeaderMap};
//! use axum::response::IntoResponse;
//! use axum::routing::get;
//! use axum::Router;
//!
//! use axum_byteserve::{FileServer, ServeOutcome};
//!
//! async fn download(Path(path): Path<String>, headers: HeaderMap) -> impl IntoResponse {
//!     let server = FileServer::new("./files");
//!     let range = headers.get(header::RANGE).and_then(|value| value.to_str().ok());
//!
//!     match server.serve(&path, range, false).await {
//!         Ok(ServeOutcome::Download(download)) => download.into_response(),
//!         Ok(ServeOutcome::Directory(dir)) => {
//!             format!("{} is a directory", dir.display()).into_response()
//!         }
//!         Err(err) => err.into_response(),
//!     }
//! }
//!
//! let _app: Router = Router::new().route("/{*path}", get(download));
//! ```
//!
//! Lower-level pieces ([`parse_range`], [`ChunkStream`],
//! [`FileMetadata`], [`resolve_type`]) are exported for callers that
//! want to assemble responses themselves.
//!
//! [1]: https://docs.rs/axum

mod error;
mod meta;
mod mime;
mod range;
mod response;
mod stream;

use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::AsyncSeek;

pub use error::ServeError;
pub use meta::FileMetadata;
pub use mime::resolve_type;
pub use range::{parse_range, ByteRange};
pub use response::Download;
pub use stream::{ChunkStream, DEFAULT_CHUNK_SIZE};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// Serves files from a root directory as resumable downloads.
///
/// One value can serve any number of requests; it holds only
/// configuration.
#[derive(Debug, Clone)]
pub struct FileServer {
    root: PathBuf,
    chunk_size: u64,
    strict_ranges: bool,
}

/// What a request path resolved to.
pub enum ServeOutcome {
    /// A file, composed and ready to stream.
    Download(Download),
    /// An existing directory. Callers decide how to present it, the
    /// usual choice being a generated listing.
    Directory(PathBuf),
}

impl FileServer {
    /// Serve files under `root` with the default 1 MiB chunk size.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileServer {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            strict_ranges: false,
        }
    }

    /// Cap on the number of bytes read and buffered per chunk.
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Reject ranges starting at or beyond end of file with
    /// [`ServeError::RangeNotSatisfiable`] instead of streaming an
    /// empty body. Off by default.
    pub fn strict_ranges(mut self, strict: bool) -> Self {
        self.strict_ranges = strict;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `request_path` against the root and prepare the file
    /// for download.
    ///
    /// `range_header` is the raw `Range` value, if the request carried
    /// one. Values outside the supported `bytes=<start>-[<end>]`
    /// shapes are ignored and the whole file is served.
    /// `force_download` pins the content type to
    /// `application/octet-stream` regardless of extension.
    pub async fn serve(
        &self,
        request_path: &str,
        range_header: Option<&str>,
        force_download: bool,
    ) -> Result<ServeOutcome, ServeError> {
        let path = self.locate(request_path)?;
        let meta = FileMetadata::resolve(&path).await?;

        if meta.is_directory {
            return Ok(ServeOutcome::Directory(path));
        }

        let range = parse_range(range_header, meta.size);

        if self.strict_ranges {
            if let Some(range) = range {
                if range.start >= meta.size {
                    return Err(ServeError::RangeNotSatisfiable { size: meta.size });
                }
            }
        }

        let filename = request_path.trim_start_matches('/');
        let content_type = resolve_type(filename, force_download);

        // the file can vanish between the stat and the open
        let file = File::open(&path).await.map_err(ServeError::from_io)?;

        tracing::debug!(
            path = %path.display(),
            size = meta.size,
            range = ?range,
            content_type,
            "serving download"
        );

        Ok(ServeOutcome::Download(Download::compose(
            &meta,
            range,
            filename,
            content_type,
            file,
            self.chunk_size,
        )))
    }

    /// Map `request_path` to a filesystem path under the root. Parent
    /// components surface as [`ServeError::NotFound`], so a crafted
    /// path cannot climb out of the served tree.
    pub fn locate(&self, request_path: &str) -> Result<PathBuf, ServeError> {
        let mut path = self.root.clone();

        for component in Path::new(request_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    tracing::warn!(request_path, "rejected path escaping the served root");
                    return Err(ServeError::NotFound);
                }
            }
        }

        Ok(path)
    }
}
