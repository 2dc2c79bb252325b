use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::ContentRange;
use axum_extra::TypedHeader;
use thiserror::Error;

/// Body text for missing paths. Clients scrape this string, so it is
/// part of the wire contract.
pub(crate) const NOT_FOUND_BODY: &str = "file not exists!";

/// Failure modes of [`FileServer::serve`](crate::FileServer::serve).
#[derive(Debug, Error)]
pub enum ServeError {
    /// The request path does not name an existing file under the root.
    #[error("{}", NOT_FOUND_BODY)]
    NotFound,
    /// Strict mode rejected a range starting at or beyond end of file.
    #[error("range not satisfiable for file of {size} bytes")]
    RangeNotSatisfiable { size: u64 },
    /// Filesystem failure other than a missing path.
    #[error("{0}")]
    Io(io::Error),
}

impl ServeError {
    /// Missing paths become the fixed 404; everything else is a server fault.
    pub(crate) fn from_io(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ServeError::NotFound
        } else {
            ServeError::Io(err)
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        match self {
            ServeError::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response(),
            ServeError::RangeNotSatisfiable { size } => {
                let header = TypedHeader(ContentRange::unsatisfied_bytes(size));
                (StatusCode::RANGE_NOT_SATISFIABLE, header, ()).into_response()
            }
            ServeError::Io(err) => {
                tracing::error!("failed to serve file: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
