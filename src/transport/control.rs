//! Control connection framing

use super::{TransportError, TransportResult};
use crate::protocol::{decode_reply, encode_command, Command, Reply};
use bytes::{Buf, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Command / reply framing over a byte stream
#[derive(Debug)]
pub struct ControlChannel<S> {
    stream: S,
    read_buf: BytesMut,
}

impl<S> ControlChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(4096),
        }
    }

    /// Underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Send a command
    pub async fn send(&mut self, cmd: &Command) -> TransportResult<()> {
        let buf = encode_command(cmd)?;
        self.stream.write_all(&buf).await.map_err(closed_or_io)?;
        self.stream.flush().await.map_err(closed_or_io)?;
        Ok(())
    }

    /// Receive the next complete reply
    pub async fn read_reply(&mut self) -> TransportResult<Reply> {
        loop {
            match decode_reply(&self.read_buf) {
                Ok((reply, consumed)) => {
                    self.read_buf.advance(consumed);
                    return Ok(reply);
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                Err(e) => return Err(TransportError::MalformedReply(e.to_string())),
            }

            // Need more data
            let n = self
                .stream
                .read_buf(&mut self.read_buf)
                .await
                .map_err(closed_or_io)?;
            if n == 0 {
                return Err(TransportError::ConnectionClosed);
            }
        }
    }

    /// Shut down the write half
    pub async fn shutdown(&mut self) -> TransportResult<()> {
        self.stream.shutdown().await.map_err(closed_or_io)
    }
}

/// Resets and broken pipes mean the peer is gone, not that one command failed
fn closed_or_io(e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => TransportError::ConnectionClosed,
        _ => TransportError::Io(e),
    }
}
