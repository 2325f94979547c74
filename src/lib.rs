//! FTP connection lifecycle management
//!
//! `ftp-conn` wraps a raw FTP client in a small state machine that enforces
//! connect / login / logout / disconnect ordering, recovers from unexpected
//! connection loss, keeps idle sessions alive with periodic `NOOP`s, and hands
//! out connections matched against requested credentials.
//!
//! # Layout
//!
//! * [`protocol`]: FTP command encoding, reply decoding, listing parsing
//! * [`transport`]: the [`Transport`] abstraction and the tokio [`FtpClient`]
//! * [`connection`]: [`Connection`], [`KeepAliveDriver`], [`RemoteLookup`]
//! * [`manager`]: [`ConnectionManager`]
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> ftp_conn::Result<()> {
//! use ftp_conn::{Connection, ConnectionOptions, Credentials, FtpClient};
//!
//! let credentials = Credentials::new("ftp.example.com", "bob", "secret", 21);
//! let mut conn = Connection::new(FtpClient::new(), credentials, ConnectionOptions::default());
//!
//! conn.connect().await?;
//! conn.login().await?;
//!
//! if let Some(files) = conn.list_files("/pub").await? {
//!     for file in files {
//!         println!("{}", file.name);
//!     }
//! }
//!
//! conn.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod protocol;
pub mod transport;
pub mod url;

pub use connection::{
    Connection, ConnectionKey, ConnectionOptions, ConnectionState, Credentials, KeepAliveDriver,
    ModifiedTime, PathStats, RemoteLookup,
};
pub use error::{Action, Error, Result};
pub use manager::{ConnectionManager, SharedConnection};
pub use protocol::{FileKind, RemoteFile, Reply};
pub use transport::{FtpClient, Timeouts, Transport, TransportError};
pub use url::FtpUrl;
