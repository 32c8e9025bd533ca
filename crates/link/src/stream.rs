//! Link over any async byte stream (a pty, a TCP socket, a serial device handle)

use std::io::ErrorKind;
use std::time::Duration;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::{Link, LinkError};

pub struct StreamLink<T> {
    inner: T,
}

impl<T> StreamLink<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T> Link for StreamLink<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        self.inner.write_all(&[byte]).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn read_byte(&mut self, window: Duration) -> Result<Option<u8>, LinkError> {
        match timeout(window, self.inner.read_u8()).await {
            Ok(Ok(byte)) => Ok(Some(byte)),
            Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => Err(LinkError::Closed),
            Ok(Err(e)) => Err(LinkError::Io(e)),
            Err(_) => Ok(None),
        }
    }
}
