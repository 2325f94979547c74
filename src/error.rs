//! Error types
//!
//! Everything the transport layer raises is translated into one of these
//! variants at the [`Connection`](crate::Connection) boundary. "Not performed"
//! outcomes (for example an operation issued before login) are returned as
//! `false` / `None` and never appear here.

use crate::protocol::Reply;
use crate::transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Boxed low-level cause attached to an [`Error`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Category of operation that was attempted, attached to
/// [`Error::NotConnected`] for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Opening the control connection
    Connect,
    /// Closing the control connection (also used by logout)
    Disconnect,
    /// Authenticating
    Login,
    /// Directory navigation and read-only listings
    Navigate,
    /// Retrieving a remote file
    Download,
    /// Storing a local file
    Upload,
    /// Creating, renaming or removing remote entries
    Modification,
    /// Status, size and modification time queries
    StatusCheck,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
            Self::Login => write!(f, "login"),
            Self::Navigate => write!(f, "navigate"),
            Self::Download => write!(f, "download"),
            Self::Upload => write!(f, "upload"),
            Self::Modification => write!(f, "modification"),
            Self::StatusCheck => write!(f, "status_check"),
        }
    }
}

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted on a connection that is not connected
    #[error("not connected (attempted {action})")]
    NotConnected {
        /// What the caller tried to do
        action: Action,
    },

    /// Server answered the connection attempt with a negative reply
    #[error("connection refused by server: {reply}")]
    ConnectionRefused {
        /// Raw server reply
        reply: String,
    },

    /// Transport failed or was closed unexpectedly; the connection was reset
    #[error("connection failed: {message}")]
    ConnectionFailed {
        /// Description of the failed step
        message: String,
        /// Last server reply, possibly empty
        reply: String,
        /// Underlying transport fault
        #[source]
        source: Option<TransportError>,
    },

    /// A command could not be sent or its reply could not be read
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of the failed command
        message: String,
        /// Last server reply, possibly empty
        reply: String,
        /// Underlying transport fault
        #[source]
        source: Option<TransportError>,
    },

    /// Local file access or data stream copy failed during a transfer
    #[error("transfer failed: {message}")]
    TransferError {
        /// Description of the failed transfer
        message: String,
        /// Underlying fault
        #[source]
        source: Option<BoxError>,
    },

    /// The server sent data that could not be interpreted
    #[error("protocol error: {message}")]
    ProtocolError {
        /// What could not be interpreted
        message: String,
        /// Last server reply, possibly empty
        reply: String,
    },

    /// Invalid configuration or FTP URL
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a [`Error::ProtocolError`] raised after `last_reply`
    pub(crate) fn protocol(message: impl Into<String>, last_reply: &Reply) -> Self {
        Error::ProtocolError {
            message: message.into(),
            reply: last_reply.reply_string(),
        }
    }

    /// Shorthand for a [`Error::TransferError`] caused by a local I/O fault
    pub(crate) fn transfer(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::TransferError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classify a transport fault raised while performing `message`
    ///
    /// A closed control connection is fatal, a failed stream copy is a
    /// transfer fault, an unparseable reply is a protocol fault, and anything
    /// else failed the single command only.
    pub(crate) fn from_transport(
        err: TransportError,
        message: impl Into<String>,
        last_reply: &Reply,
    ) -> Self {
        let message = message.into();
        let reply = last_reply.reply_string();
        match err {
            TransportError::ConnectionClosed => Error::ConnectionFailed {
                message,
                reply,
                source: Some(err),
            },
            TransportError::CopyStream { .. } => Error::TransferError {
                message,
                source: Some(Box::new(err)),
            },
            TransportError::MalformedReply(detail) => Error::ProtocolError {
                message: format!("{}: {}", message, detail),
                reply,
            },
            TransportError::Timeout(_) | TransportError::Io(_) => Error::CommandFailed {
                message,
                reply,
                source: Some(err),
            },
        }
    }

    /// The connection that produced this error is unusable and must be
    /// reconnected (or replaced) before retrying
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConnectionRefused { .. } | Error::ConnectionFailed { .. }
        )
    }

    /// Retrying the same operation on the same connection might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::CommandFailed { .. } | Error::TransferError { .. })
    }

    /// The caller issued the operation in the wrong state; this is a defect
    /// in the caller rather than something to retry
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::NotConnected { .. })
    }

    /// Action category for [`Error::NotConnected`]
    pub fn action(&self) -> Option<Action> {
        match self {
            Error::NotConnected { action } => Some(*action),
            _ => None,
        }
    }

    /// Raw server reply associated with this error, if any
    pub fn reply(&self) -> Option<&str> {
        match self {
            Error::ConnectionRefused { reply }
            | Error::ConnectionFailed { reply, .. }
            | Error::CommandFailed { reply, .. }
            | Error::ProtocolError { reply, .. }
                if !reply.is_empty() =>
            {
                Some(reply.as_str())
            }
            _ => None,
        }
    }
}
