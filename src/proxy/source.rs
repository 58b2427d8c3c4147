//! Byte Sources
//!
//! The transport seam the header reader pulls from. A source hands out
//! contiguous chunks and can be paused so no other consumer sees bytes
//! while the header is being decoded.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

/// Default read size for a single chunk
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// A pausable producer of byte chunks
#[async_trait]
pub trait ByteSource: Send {
    /// Wait for the next chunk. `Ok(None)` means end of stream.
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>>;

    /// Stop delivering bytes to other consumers
    fn pause(&mut self);

    /// Undo `pause`
    fn resume(&mut self);

    /// Whether `pause` is in effect
    fn is_paused(&self) -> bool;
}

/// Adapts any `AsyncRead` into a [`ByteSource`].
///
/// While paused, reads through the `AsyncRead` impl stay pending and are
/// woken on `resume`. `next_chunk` always reads, since it is the path the
/// header reader itself uses.
#[derive(Debug)]
pub struct StreamSource<S> {
    inner: S,
    chunk_size: usize,
    paused: bool,
    parked: Option<Waker>,
}

impl<S> StreamSource<S> {
    /// Wrap `inner` with the default chunk size
    pub fn new(inner: S) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// Wrap `inner`, reading at most `chunk_size` bytes per chunk
    pub fn with_chunk_size(inner: S, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
            paused: false,
            parked: None,
        }
    }

    /// Underlying stream
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutable underlying stream. Bypasses pausing.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S> ByteSource for StreamSource<S>
where
    S: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let n = self.inner.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
        if let Some(waker) = self.parked.take() {
            waker.wake();
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for StreamSource<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.paused {
            this.parked = Some(cx.waker().clone());
            return Poll::Pending;
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for StreamSource<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
