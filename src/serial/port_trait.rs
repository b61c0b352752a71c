//! Trait abstraction for the receiver byte stream to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Trait for reading the receiver's byte stream
#[async_trait]
pub trait ByteSource: Send {
    /// Read whatever bytes are available, waiting until at least one arrives
    ///
    /// Returns `Ok(0)` at end of stream. Must be cancel-safe: dropping the
    /// future before it completes loses no bytes.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Adapter that turns any `AsyncRead` into a [`ByteSource`]
///
/// Covers the UART (`tokio_serial::SerialStream`) and replay files
/// (`tokio::fs::File`) alike.
pub struct AsyncReadSource<R> {
    reader: R,
}

impl<R> AsyncReadSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R> ByteSource for AsyncReadSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf).await
    }
}

#[async_trait]
impl ByteSource for Box<dyn ByteSource> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf).await
    }
}
