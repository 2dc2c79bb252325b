use std::time::SystemTime;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::fs::File;

use crate::meta::FileMetadata;
use crate::range::ByteRange;
use crate::stream::ChunkStream;

/// Characters left intact when encoding a filename stem for
/// `Content-Disposition`: the unreserved set plus `/`, matching what
/// URL quoting leaves alone for path-shaped download names.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// A composed download: status, header values, and the chunk stream
/// that becomes the body. Produced by
/// [`FileServer::serve`](crate::FileServer::serve); send it to the
/// client with [`IntoResponse`].
pub struct Download {
    status: StatusCode,
    content_type: &'static str,
    content_length: u64,
    content_range: Option<String>,
    filename: String,
    modified: SystemTime,
    stream: ChunkStream<File>,
}

impl Download {
    /// Assemble status and headers for a file described by `meta`,
    /// streamed from the start of `range` (or byte zero) to end of
    /// file.
    ///
    /// Status is 206 exactly when the resume offset is positive, and
    /// `Content-Range` is emitted only alongside a 206. For regular
    /// files `Content-Length` declares every byte from the offset to
    /// end of file, which is also what the body carries; non-regular
    /// files advertise their full stat size.
    pub(crate) fn compose(
        meta: &FileMetadata,
        range: Option<ByteRange>,
        filename: &str,
        content_type: &'static str,
        file: File,
        chunk_size: u64,
    ) -> Download {
        let size = meta.size;
        let (start, end) = match range {
            Some(range) => (range.start, range.end),
            None => (0, size.saturating_sub(1)),
        };

        let content_length = if meta.is_regular_file {
            size.saturating_sub(start)
        } else {
            size
        };

        let status = if start > 0 {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };

        let content_range = (start > 0).then(|| format!("bytes {start}-{end}/{size}"));

        Download {
            status,
            content_type,
            content_length,
            content_range,
            filename: filename.to_owned(),
            modified: meta.modified,
            stream: ChunkStream::new(file, start, chunk_size),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn content_range(&self) -> Option<&str> {
        self.content_range.as_deref()
    }
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let mut builder = Response::builder()
            .status(self.status)
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_TYPE, self.content_type)
            .header(header::CONTENT_LENGTH, self.content_length);

        if let Some(content_range) = &self.content_range {
            builder = builder.header(header::CONTENT_RANGE, content_range.as_str());
        }

        let response = builder
            .header(header::CONTENT_DISPOSITION, disposition_value(&self.filename))
            .header(header::LAST_MODIFIED, httpdate::fmt_http_date(self.modified))
            .header(header::CONNECTION, "keep-alive")
            .body(axum::body::Body::new(self.stream));

        // infallible: names are constants and every value is pre-validated
        response.unwrap()
    }
}

/// Quote `filename` for a `Content-Disposition: attachment` header.
/// The stem is percent-encoded; the extension rides along verbatim so
/// clients see the type they asked for.
fn disposition_value(filename: &str) -> HeaderValue {
    let quoted = format!("attachment; filename=\"{}\"", encode_filename(filename));

    HeaderValue::from_str(&quoted).unwrap_or_else(|_| {
        // the extension smuggled in a header-invalid byte, so encode
        // the whole name instead
        let encoded = utf8_percent_encode(filename, FILENAME_ENCODE_SET);
        let quoted = format!("attachment; filename=\"{encoded}\"");

        // percent-encoded output is printable ascii, always a valid value
        HeaderValue::from_str(&quoted).unwrap()
    })
}

fn encode_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, extension)) => {
            format!("{}.{}", utf8_percent_encode(stem, FILENAME_ENCODE_SET), extension)
        }
        None => utf8_percent_encode(filename, FILENAME_ENCODE_SET).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use futures::StreamExt;
    use tokio::fs::File;

    use super::{encode_filename, Download};
    use crate::meta::FileMetadata;
    use crate::range::ByteRange;
    use crate::stream::DEFAULT_CHUNK_SIZE;

    const FIXTURE: &str = "test/fixture.txt";
    const FIXTURE_SIZE: u64 = 62;

    fn meta(size: u64, is_regular_file: bool) -> FileMetadata {
        FileMetadata {
            size,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            is_regular_file,
            is_directory: false,
        }
    }

    async fn compose(range: Option<ByteRange>) -> Download {
        let file = File::open(FIXTURE).await.unwrap();
        Download::compose(
            &meta(FIXTURE_SIZE, true),
            range,
            "fixture.txt",
            "text/plain",
            file,
            DEFAULT_CHUNK_SIZE,
        )
    }

    #[tokio::test]
    async fn full_file_is_a_200_without_content_range() {
        let download = compose(None).await;
        assert_eq!(StatusCode::OK, download.status());
        assert_eq!(FIXTURE_SIZE, download.content_length());
        assert_eq!(None, download.content_range());
    }

    #[tokio::test]
    async fn resumed_download_is_a_206_with_content_range() {
        let download = compose(Some(ByteRange::new(10, 61))).await;
        assert_eq!(StatusCode::PARTIAL_CONTENT, download.status());
        assert_eq!(52, download.content_length());
        assert_eq!(Some("bytes 10-61/62"), download.content_range());
    }

    #[tokio::test]
    async fn range_from_byte_zero_stays_a_200() {
        let download = compose(Some(ByteRange::new(0, 30))).await;
        assert_eq!(StatusCode::OK, download.status());
        assert_eq!(FIXTURE_SIZE, download.content_length());
        assert_eq!(None, download.content_range());
    }

    #[tokio::test]
    async fn non_regular_files_advertise_their_stat_size() {
        let file = File::open(FIXTURE).await.unwrap();
        let download = Download::compose(
            &meta(FIXTURE_SIZE, false),
            Some(ByteRange::new(10, 61)),
            "fixture.txt",
            "text/plain",
            file,
            DEFAULT_CHUNK_SIZE,
        );
        assert_eq!(StatusCode::PARTIAL_CONTENT, download.status());
        assert_eq!(FIXTURE_SIZE, download.content_length());
    }

    #[tokio::test]
    async fn response_carries_the_download_header_set() {
        let response = compose(Some(ByteRange::new(6, 61))).await.into_response();
        assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());

        let headers = response.headers();
        assert_eq!("bytes", headers.get("accept-ranges").unwrap());
        assert_eq!("text/plain", headers.get("content-type").unwrap());
        assert_eq!("56", headers.get("content-length").unwrap());
        assert_eq!("bytes 6-61/62", headers.get("content-range").unwrap());
        assert_eq!(
            "attachment; filename=\"fixture.txt\"",
            headers.get("content-disposition").unwrap(),
        );
        assert_eq!("keep-alive", headers.get("connection").unwrap());

        let last_modified = headers.get("last-modified").unwrap().to_str().unwrap();
        assert!(last_modified.ends_with(" GMT"), "{last_modified:?}");

        let mut body = response.into_body().into_data_stream();
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(
            &b"6789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz"[..],
            &bytes[..],
        );
    }

    #[tokio::test]
    async fn header_invalid_filename_bytes_are_fully_encoded() {
        let file = File::open(FIXTURE).await.unwrap();
        let response = Download::compose(
            &meta(FIXTURE_SIZE, true),
            None,
            "evil.t\nxt",
            "application/octet-stream",
            file,
            DEFAULT_CHUNK_SIZE,
        )
        .into_response();

        let disposition = response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        assert!(disposition.contains("%0A"), "{disposition:?}");
    }

    #[test]
    fn filename_stems_are_encoded_and_extensions_kept() {
        assert_eq!("fixture.txt", encode_filename("fixture.txt"));
        assert_eq!("my%20file.txt", encode_filename("my file.txt"));
        assert_eq!("%E4%B8%AD%E6%96%87.txt", encode_filename("中文.txt"));
        assert_eq!("docs/report.pdf", encode_filename("docs/report.pdf"));
        assert_eq!("a.b.txt", encode_filename("a.b.txt"));
        assert_eq!("README", encode_filename("README"));
        assert_eq!("50%25%20off", encode_filename("50% off"));
    }
}
