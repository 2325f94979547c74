//! Transport abstraction
//!
//! A [`Transport`] is the raw FTP client a [`Connection`](crate::Connection)
//! drives: it performs single protocol exchanges and reports what the server
//! answered, without any notion of connection state policy. [`FtpClient`] is
//! the tokio TCP implementation.

mod client;
mod control;
#[cfg(test)]
pub(crate) mod mock;

pub use client::FtpClient;
pub use control::ControlChannel;

use crate::protocol::{RemoteFile, Reply};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Result alias for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Faults raised by a [`Transport`]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The control connection was closed by the peer, or the server replied
    /// 421 (service not available)
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// No reply within the configured timeout
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// I/O fault on the control or data connection
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Copying between a local stream and the data connection failed
    #[error("data stream copy failed: {source}")]
    CopyStream {
        /// Underlying fault
        #[source]
        source: io::Error,
    },

    /// Server reply could not be parsed
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

/// Timeouts applied by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Connect and command reply timeout
    pub command: Duration,
    /// Interval between keep-alive `NOOP`s
    pub keep_alive: Duration,
    /// Timeout for the keep-alive `NOOP` reply
    pub keep_alive_reply: Duration,
    /// Data connection timeout
    pub data: Duration,
}

impl Timeouts {
    /// Same duration for every timeout
    pub fn uniform(duration: Duration) -> Self {
        Self {
            command: duration,
            keep_alive: duration,
            keep_alive_reply: duration,
            data: duration,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(
            crate::protocol::constants::DEFAULT_TIMEOUT_SECS as u64,
        ))
    }
}

/// Raw FTP client operations
///
/// Boolean results report whether the server answered with a positive
/// completion; `Err` is reserved for faults. Implementations must treat a
/// closed control connection as [`TransportError::ConnectionClosed`].
#[async_trait]
pub trait Transport: Send + 'static {
    /// Open the control connection and read the greeting
    async fn connect(&mut self, host: &str, port: u16) -> TransportResult<Reply>;

    /// Close the control connection
    async fn disconnect(&mut self) -> TransportResult<()>;

    /// Control connection is open
    fn is_connected(&self) -> bool;

    /// Last reply received
    fn last_reply(&self) -> &Reply;

    /// Apply timeouts to subsequent operations
    fn set_timeouts(&mut self, timeouts: Timeouts);

    /// USER / PASS
    async fn login(&mut self, user: &str, password: &str) -> TransportResult<bool>;

    /// QUIT
    async fn logout(&mut self) -> TransportResult<bool>;

    /// NOOP
    async fn noop(&mut self) -> TransportResult<bool>;

    /// TYPE I
    async fn set_binary_mode(&mut self) -> TransportResult<bool>;

    /// Features advertised by `FEAT` (upper-cased names)
    async fn features(&mut self) -> TransportResult<Vec<String>>;

    /// Feature advertised by `FEAT`
    async fn has_feature(&mut self, feature: &str) -> TransportResult<bool> {
        Ok(self
            .features()
            .await?
            .iter()
            .any(|f| f.eq_ignore_ascii_case(feature)))
    }

    /// CWD
    async fn change_working_directory(&mut self, path: &str) -> TransportResult<bool>;

    /// CDUP
    async fn change_to_parent_directory(&mut self) -> TransportResult<bool>;

    /// PWD
    async fn print_working_directory(&mut self) -> TransportResult<Option<String>>;

    /// LIST; an empty vector when the server lists nothing or refuses
    async fn list(&mut self, path: &str) -> TransportResult<Vec<RemoteFile>>;

    /// MLSD
    async fn machine_list_directory(&mut self, path: &str) -> TransportResult<Vec<RemoteFile>>;

    /// MLST
    async fn machine_list_file(&mut self, path: &str) -> TransportResult<Option<RemoteFile>>;

    /// MKD
    async fn make_directory(&mut self, path: &str) -> TransportResult<bool>;

    /// RMD
    async fn remove_directory(&mut self, path: &str) -> TransportResult<bool>;

    /// DELE
    async fn delete_file(&mut self, path: &str) -> TransportResult<bool>;

    /// RNFR / RNTO
    async fn rename(&mut self, from: &str, to: &str) -> TransportResult<bool>;

    /// STAT, optionally for a path; the reply text on success
    async fn status(&mut self, path: Option<&str>) -> TransportResult<Option<String>>;

    /// SIZE
    async fn size(&mut self, path: &str) -> TransportResult<Option<u64>>;

    /// MDTM; the raw time-val on success
    async fn modification_time(&mut self, path: &str) -> TransportResult<Option<String>>;

    /// STOR from `source`
    async fn store(
        &mut self,
        remote: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> TransportResult<bool>;

    /// RETR into `sink`
    async fn retrieve(
        &mut self,
        remote: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> TransportResult<bool>;
}
