use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::{io, mem};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame};
use pin_project::pin_project;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

use crate::AsyncSeekStart;

/// Default per-chunk read cap: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Lazy chunked reads from a seek offset to end of stream. Implements
/// [`Stream`], [`Body`], and [`IntoResponse`].
///
/// The underlying reader is seeked once, then read into freshly
/// allocated buffers of at most `chunk_size` bytes, so only one chunk
/// is held at a time no matter how large the file is. Dropping the
/// stream mid-read drops the reader with it.
#[pin_project]
pub struct ChunkStream<B> {
    state: ChunkState,
    chunk_size: usize,
    #[pin]
    body: B,
}

#[derive(Debug)]
enum ChunkState {
    Seek { offset: u64 },
    Seeking,
    Reading { buffer: BytesMut },
}

impl ChunkStream<File> {
    /// Open `path` and stream it from `offset` in `chunk_size` reads.
    /// The seek happens lazily on first poll.
    pub async fn open(
        path: impl AsRef<Path>,
        offset: u64,
        chunk_size: u64,
    ) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(ChunkStream::new(file, offset, chunk_size))
    }
}

impl<B: AsyncRead + AsyncSeekStart> ChunkStream<B> {
    /// Stream `body` from `offset`, yielding buffers of at most
    /// `chunk_size` bytes until the reader reports end of stream.
    pub fn new(body: B, offset: u64, chunk_size: u64) -> Self {
        // a zero chunk size would read nothing and poll forever
        let chunk_size = usize::try_from(chunk_size).unwrap_or(usize::MAX).max(1);

        ChunkStream {
            state: ChunkState::Seek { offset },
            chunk_size,
            body,
        }
    }
}

impl<B: AsyncRead + AsyncSeekStart + Send + 'static> IntoResponse for ChunkStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: AsyncRead + AsyncSeekStart> Body for ChunkStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Frame<Bytes>>>> {
        self.poll_next(cx)
            .map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: AsyncRead + AsyncSeekStart> Stream for ChunkStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        if let ChunkState::Seek { offset } = *this.state {
            match this.body.as_mut().start_seek(offset) {
                Err(e) => {
                    return Poll::Ready(Some(Err(e)));
                }
                Ok(()) => {
                    *this.state = ChunkState::Seeking;
                }
            }
        }

        if let ChunkState::Seeking = *this.state {
            match this.body.as_mut().poll_complete(cx) {
                Poll::Pending => {
                    return Poll::Pending;
                }
                Poll::Ready(Err(e)) => {
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Ok(())) => {
                    let buffer = BytesMut::with_capacity(*this.chunk_size);
                    *this.state = ChunkState::Reading { buffer };
                }
            }
        }

        if let ChunkState::Reading { buffer } = this.state {
            let uninit = buffer.spare_capacity_mut();
            let mut read_buf = ReadBuf::uninit(uninit);

            match this.body.as_mut().poll_read(cx, &mut read_buf) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => match read_buf.filled().len() {
                    // a zero length read means end of stream
                    0 => Poll::Ready(None),
                    n => {
                        // SAFETY: poll_read has filled the buffer with `n`
                        // additional bytes past the current length
                        unsafe {
                            buffer.set_len(buffer.len() + n);
                        }

                        // replace state buffer and take this one to return
                        let chunk =
                            mem::replace(buffer, BytesMut::with_capacity(*this.chunk_size));

                        Poll::Ready(Some(Ok(chunk.freeze())))
                    }
                },
            }
        } else {
            unreachable!();
        }
    }
}
