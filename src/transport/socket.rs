//! TCP-backed transport implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use super::Connection;
use crate::error::{BinkError, Result};

/// Production transport over a connected `TcpStream`.
pub struct TcpConnection {
    stream: TcpStream,
    open: bool,
}

impl TcpConnection {
    /// Wrap an already-connected stream (accepting side).
    pub fn new(stream: TcpStream) -> Self {
        Self { stream, open: true }
    }

    /// Connect to a remote endpoint (originating side).
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, data: &[u8], deadline: Duration) -> Result<usize> {
        if !self.open {
            return Err(BinkError::TransportClosed);
        }
        match tokio::time::timeout(deadline, self.stream.write_all(data)).await {
            Ok(Ok(())) => Ok(data.len()),
            Ok(Err(e)) => Err(BinkError::Io(e)),
            Err(_) => Err(BinkError::Timeout("send")),
        }
    }

    async fn receive(&mut self, max_len: usize, deadline: Duration) -> Result<Bytes> {
        if !self.open {
            return Err(BinkError::TransportClosed);
        }
        let mut buf = vec![0u8; max_len];
        match tokio::time::timeout(deadline, self.stream.read(&mut buf)).await {
            Ok(Ok(0)) => Err(BinkError::TransportClosed),
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(Bytes::from(buf))
            }
            Ok(Err(e)) => Err(BinkError::Io(e)),
            Err(_) => Err(BinkError::Timeout("receive")),
        }
    }

    async fn close(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.open = false;
        self.stream.shutdown().await.is_ok()
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
