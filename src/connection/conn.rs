//! Core connection type

use super::credentials::{ConnectionKey, Credentials};
use super::keepalive::KeepAliveDriver;
use super::lookup::{ModifiedTime, PathStats, RemoteLookup};
use super::options::{normalize_timeout, ConnectionOptions};
use super::paths::{remote_basename, remote_join};
use super::state::ConnectionState;
use crate::error::{Action, Error, Result};
use crate::metrics::{counters, labels};
use crate::protocol::{RemoteFile, Reply};
use crate::transport::{Timeouts, Transport, TransportError, TransportResult};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// FTP connection lifecycle
///
/// A `Connection` drives a [`Transport`] through
/// `Idle → connect → Connected → login → Ready` and back, refusing operations
/// that the current state does not allow:
///
/// * issued while not connected: [`Error::NotConnected`]
/// * issued while connected but not logged in: `Ok(false)` / `Ok(None)`
///
/// Whenever the transport reports that the control connection closed, the
/// connection drops back to `Idle` before the error is returned.
pub struct Connection<T: Transport> {
    transport: Arc<tokio::sync::Mutex<T>>,
    credentials: Credentials,
    options: ConnectionOptions,
    connected: bool,
    logged_in: bool,
    keep_alive: KeepAliveDriver<T>,
    last_reply: Reply,
}

impl<T: Transport> Connection<T> {
    /// Create an idle connection
    pub fn new(mut transport: T, credentials: Credentials, options: ConnectionOptions) -> Self {
        transport.set_timeouts(options.timeouts());
        let transport = Arc::new(tokio::sync::Mutex::new(transport));
        Self {
            keep_alive: KeepAliveDriver::new(Arc::clone(&transport), options.timeout()),
            transport,
            credentials,
            options,
            connected: false,
            logged_in: false,
            last_reply: Reply::default(),
        }
    }

    /// Credentials this connection logs in with
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Password-free identity
    pub fn key(&self) -> ConnectionKey {
        self.credentials.identity()
    }

    /// Current options
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Control connection is open
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Authenticated
    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_flags(self.connected, self.logged_in)
    }

    /// Keep-alive task is active
    pub fn keep_alive_running(&self) -> bool {
        self.keep_alive.is_running()
    }

    /// Code of the last reply to a foreground command
    pub fn reply_code(&self) -> u16 {
        self.last_reply.code
    }

    /// Raw text of the last reply to a foreground command
    pub fn reply_string(&self) -> String {
        self.last_reply.reply_string()
    }

    /// Replace the options
    ///
    /// Ignored while connected; returns whether the options were applied.
    pub async fn set_options(&mut self, options: ConnectionOptions) -> bool {
        if self.connected {
            tracing::debug!("options unchanged while connected");
            return false;
        }
        let timeouts = options.timeouts();
        self.options = options;
        self.apply_timeouts(timeouts).await;
        true
    }

    /// Set command, keep-alive, keep-alive reply and data timeouts
    ///
    /// Ignored while connected; returns whether the timeout was applied.
    /// Zero restores the default.
    pub async fn set_timeout_time(&mut self, seconds: u32) -> bool {
        if self.connected {
            tracing::debug!("timeout unchanged while connected");
            return false;
        }
        let seconds = normalize_timeout(seconds);
        self.options = self.options.clone().with_timeout_seconds(seconds);
        self.apply_timeouts(Timeouts::uniform(Duration::from_secs(u64::from(seconds))))
            .await;
        true
    }

    async fn apply_timeouts(&mut self, timeouts: Timeouts) {
        self.transport.lock().await.set_timeouts(timeouts);
        self.keep_alive.set_interval(timeouts.keep_alive);
    }

    /// Open the control connection
    ///
    /// Returns `false` without any network traffic when already connected.
    /// Switches the transfer type to binary on success.
    pub async fn connect(&mut self) -> Result<bool> {
        let span = tracing::info_span!(
            "connect",
            host = %self.credentials.host(),
            port = self.credentials.port()
        );
        async {
            if self.connected {
                tracing::info!("already connected");
                return Ok(false);
            }

            let transport = Arc::clone(&self.transport);
            let mut t = transport.lock().await;
            let host = self.credentials.host().to_string();
            let port = self.credentials.port();

            let greeting = match t.connect(&host, port).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.last_reply = t.last_reply().clone();
                    self.reset(&e);
                    counters::connect_attempt(labels::OUTCOME_FAILED);
                    return Err(Error::ConnectionFailed {
                        message: format!("cannot connect to {}:{}", host, port),
                        reply: self.last_reply.reply_string(),
                        source: Some(e),
                    });
                }
            };
            self.last_reply = greeting.clone();

            if !greeting.is_positive_completion() {
                if let Err(e) = t.disconnect().await {
                    tracing::debug!(error = %e, "closing refused connection failed");
                }
                counters::connect_attempt(labels::OUTCOME_REFUSED);
                tracing::warn!(reply = %greeting, "connection refused");
                return Err(Error::ConnectionRefused {
                    reply: greeting.reply_string(),
                });
            }

            self.connected = true;
            counters::connect_attempt(labels::OUTCOME_OK);

            let binary = t.set_binary_mode().await;
            if !self.finish(&*t, binary, "TYPE I")? {
                tracing::warn!(reply = %self.last_reply, "server refused binary mode");
            }

            tracing::info!("connected");
            Ok(true)
        }
        .instrument(span)
        .await
    }

    /// Close the control connection, logging out first when needed
    ///
    /// The connection is idle afterwards even if closing failed.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.require_connected(Action::Disconnect)?;

        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;

        if self.logged_in {
            if let Err(e) = t.logout().await {
                tracing::debug!(error = %e, "logout before disconnect failed");
            }
            self.keep_alive.stop();
            self.logged_in = false;
        }

        let closed = t.disconnect().await;
        self.last_reply = t.last_reply().clone();
        self.connected = false;
        tracing::info!(host = %self.credentials.host(), "disconnected");

        match closed {
            Ok(()) | Err(TransportError::ConnectionClosed) => Ok(()),
            Err(e) => Err(Error::CommandFailed {
                message: "error while closing the connection".into(),
                reply: self.last_reply.reply_string(),
                source: Some(e),
            }),
        }
    }

    /// Authenticate with the stored credentials
    ///
    /// Returns `false` when already logged in or when the server rejects the
    /// credentials.
    pub async fn login(&mut self) -> Result<bool> {
        let span = tracing::info_span!(
            "login",
            host = %self.credentials.host(),
            user = %self.credentials.user()
        );
        async {
            self.require_connected(Action::Login)?;
            if self.logged_in {
                tracing::info!("already logged in");
                return Ok(false);
            }

            let transport = Arc::clone(&self.transport);
            let mut t = transport.lock().await;
            let result = t
                .login(self.credentials.user(), self.credentials.password())
                .await;
            if !self.finish(&*t, result, "login")? {
                tracing::info!(reply = %self.last_reply, "login rejected");
                return Ok(false);
            }

            if self.options.keep_alive() {
                self.keep_alive.start();
            }
            self.logged_in = true;
            tracing::info!("logged in");
            Ok(true)
        }
        .instrument(span)
        .await
    }

    /// End the session, staying connected
    pub async fn logout(&mut self) -> Result<bool> {
        if !self.logged_in {
            return Ok(false);
        }
        if !self.connected {
            tracing::error!(
                host = %self.credentials.host(),
                "logged in without a connection"
            );
            self.keep_alive.stop();
            self.logged_in = false;
            return Err(Error::NotConnected {
                action: Action::Disconnect,
            });
        }

        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = t.logout().await;
        let ok = self.finish(&*t, result, "logout")?;
        if ok {
            // Still holding the transport, so no NOOP can follow the QUIT
            self.keep_alive.stop();
            self.logged_in = false;
            tracing::info!(host = %self.credentials.host(), "logged out");
        }
        Ok(ok)
    }

    /// CWD
    pub async fn change_working_directory(&mut self, path: &str) -> Result<bool> {
        if !self.ready(Action::Navigate)? {
            return Ok(false);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = t.change_working_directory(path).await;
        self.finish(&*t, result, "CWD")
    }

    /// CDUP
    pub async fn change_to_parent_directory(&mut self) -> Result<bool> {
        if !self.ready(Action::Navigate)? {
            return Ok(false);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = t.change_to_parent_directory().await;
        self.finish(&*t, result, "CDUP")
    }

    /// PWD
    pub async fn working_directory(&mut self) -> Result<Option<String>> {
        if !self.ready(Action::Navigate)? {
            return Ok(None);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = t.print_working_directory().await;
        self.finish(&*t, result, "PWD")
    }

    /// Entries of a remote directory without `.` and `..`; `None` when empty
    pub async fn list_files(&mut self, path: &str) -> Result<Option<Vec<RemoteFile>>> {
        if !self.ready(Action::Navigate)? {
            return Ok(None);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = RemoteLookup::list_directory_with(&mut *t, path).await;
        self.settle(&*t, result)
    }

    /// One page of [`list_files`](Self::list_files), `page` counting from 0
    ///
    /// A page past the end is empty.
    pub async fn list_files_page(
        &mut self,
        path: &str,
        page: usize,
    ) -> Result<Option<Vec<RemoteFile>>> {
        let page_size = self.options.page_size();
        Ok(self.list_files(path).await?.map(|entries| {
            entries
                .into_iter()
                .skip(page.saturating_mul(page_size))
                .take(page_size)
                .collect()
        }))
    }

    /// Metadata of a single remote entry
    pub async fn ftp_file(&mut self, path: &str) -> Result<Option<RemoteFile>> {
        if !self.ready(Action::Navigate)? {
            return Ok(None);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = RemoteLookup::get_file_with(&mut *t, path).await;
        self.settle(&*t, result)
    }

    /// Store a local file in `remote_dir` under its own name
    ///
    /// Returns the remote path, or `None` when the local file is missing or a
    /// directory, or when `remote_dir` does not exist.
    pub async fn upload_file(
        &mut self,
        local: impl AsRef<Path>,
        remote_dir: &str,
    ) -> Result<Option<String>> {
        if !self.ready(Action::Upload)? {
            return Ok(None);
        }
        let local = local.as_ref();
        match tokio::fs::metadata(local).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                tracing::debug!(local = %local.display(), "local file missing or not a file");
                return Ok(None);
            }
        }
        let Some(name) = local.file_name() else {
            return Ok(None);
        };
        let remote = remote_join(remote_dir, &name.to_string_lossy());

        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;

        let exists = RemoteLookup::path_exists_with(&mut *t, remote_dir, true).await;
        if !self.settle(&*t, exists)? {
            tracing::debug!(remote_dir, "destination directory missing");
            return Ok(None);
        }

        let mut file = tokio::fs::File::open(local)
            .await
            .map_err(|e| Error::transfer(format!("cannot open {}", local.display()), e))?;
        let stored = t.store(&remote, &mut file).await;
        if self.finish(&*t, stored, "STOR")? {
            tracing::info!(local = %local.display(), remote = %remote, "uploaded");
            Ok(Some(remote))
        } else {
            Ok(None)
        }
    }

    /// Retrieve a remote file into `local_dir` under its remote name
    ///
    /// Returns the local path, or `None` when the remote path is missing or a
    /// directory, or when `local_dir` does not exist. A partially written
    /// local file is removed when the transfer fails.
    pub async fn download_file(
        &mut self,
        remote_path: &str,
        local_dir: impl AsRef<Path>,
    ) -> Result<Option<PathBuf>> {
        if !self.ready(Action::Download)? {
            return Ok(None);
        }
        let local_dir = local_dir.as_ref();
        match tokio::fs::metadata(local_dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                tracing::debug!(local_dir = %local_dir.display(), "local directory missing");
                return Ok(None);
            }
        }

        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;

        let found = RemoteLookup::get_file_with(&mut *t, remote_path).await;
        let file = match self.settle(&*t, found)? {
            Some(file) if !file.is_directory() => file,
            _ => {
                tracing::debug!(remote_path, "remote file missing or a directory");
                return Ok(None);
            }
        };

        // Servers that report full paths name the entry better than the caller
        let source = if file.name.contains('/') {
            file.name.as_str()
        } else {
            remote_path
        };
        let name = remote_basename(source).ok_or_else(|| {
            Error::protocol(
                format!("cannot determine the file name of {}", source),
                &self.last_reply,
            )
        })?;
        let local = local_dir.join(name);

        let mut out = tokio::fs::File::create(&local)
            .await
            .map_err(|e| Error::transfer(format!("cannot create {}", local.display()), e))?;
        let retrieved = t.retrieve(remote_path, &mut out).await;
        drop(out);

        match self.finish(&*t, retrieved, "RETR") {
            Ok(true) => {
                tracing::info!(remote = remote_path, local = %local.display(), "downloaded");
                Ok(Some(local))
            }
            outcome => {
                if let Err(e) = tokio::fs::remove_file(&local).await {
                    tracing::debug!(error = %e, "cannot remove partial download");
                }
                outcome.map(|_| None)
            }
        }
    }

    /// MKD
    pub async fn make_directory(&mut self, path: &str) -> Result<bool> {
        if !self.ready(Action::Modification)? {
            return Ok(false);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = t.make_directory(path).await;
        self.finish(&*t, result, "MKD")
    }

    /// RNFR / RNTO
    pub async fn rename_file(&mut self, from: &str, to: &str) -> Result<bool> {
        if !self.ready(Action::Modification)? {
            return Ok(false);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = t.rename(from, to).await;
        self.finish(&*t, result, "RNFR/RNTO")
    }

    /// DELE
    pub async fn remove_file(&mut self, path: &str) -> Result<bool> {
        if !self.ready(Action::Modification)? {
            return Ok(false);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = t.delete_file(path).await;
        self.finish(&*t, result, "DELE")
    }

    /// RMD
    pub async fn remove_directory(&mut self, path: &str) -> Result<bool> {
        if !self.ready(Action::Modification)? {
            return Ok(false);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = t.remove_directory(path).await;
        self.finish(&*t, result, "RMD")
    }

    /// Whether a remote directory (`is_dir`) or file exists
    ///
    /// The working directory is unchanged afterwards.
    pub async fn remote_path_exists(&mut self, path: &str, is_dir: bool) -> Result<bool> {
        if !self.ready(Action::StatusCheck)? {
            return Ok(false);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = RemoteLookup::path_exists_with(&mut *t, path, is_dir).await;
        self.settle(&*t, result)
    }

    /// Server status (`STAT`)
    pub async fn status(&mut self) -> Result<Option<String>> {
        if !self.ready(Action::StatusCheck)? {
            return Ok(None);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = RemoteLookup::status_with(&mut *t, None).await;
        self.settle(&*t, result)
    }

    /// Status of a path (`STAT path`)
    pub async fn file_status(&mut self, path: &str) -> Result<Option<String>> {
        if !self.ready(Action::StatusCheck)? {
            return Ok(None);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = RemoteLookup::status_with(&mut *t, Some(path)).await;
        self.settle(&*t, result)
    }

    /// SIZE
    pub async fn file_size(&mut self, path: &str) -> Result<Option<u64>> {
        if !self.ready(Action::StatusCheck)? {
            return Ok(None);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = RemoteLookup::size_with(&mut *t, path).await;
        self.settle(&*t, result)
    }

    /// MDTM
    pub async fn modification_time(&mut self, path: &str) -> Result<Option<ModifiedTime>> {
        if !self.ready(Action::StatusCheck)? {
            return Ok(None);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = RemoteLookup::modification_time_with(&mut *t, path).await;
        self.settle(&*t, result).map(Some)
    }

    /// Status, size and modification time of a path
    pub async fn path_stats(&mut self, path: &str) -> Result<Option<PathStats>> {
        if !self.ready(Action::StatusCheck)? {
            return Ok(None);
        }
        let transport = Arc::clone(&self.transport);
        let mut t = transport.lock().await;
        let result = RemoteLookup::path_stats_with(&mut *t, path).await;
        self.settle(&*t, result).map(Some)
    }

    fn require_connected(&self, action: Action) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        if self.logged_in {
            tracing::error!(%action, "logged in without a connection");
        }
        Err(Error::NotConnected { action })
    }

    /// Connected check, then whether the operation may proceed
    fn ready(&self, action: Action) -> Result<bool> {
        self.require_connected(action)?;
        if !self.logged_in {
            tracing::debug!(%action, "not logged in");
        }
        Ok(self.logged_in)
    }

    /// Record the reply and translate a transport outcome
    fn finish<R>(&mut self, transport: &T, result: TransportResult<R>, context: &str) -> Result<R> {
        let result = result.map_err(|e| Error::from_transport(e, context, transport.last_reply()));
        self.settle(transport, result)
    }

    /// Record the reply; a fatal error drops the connection to idle
    fn settle<R>(&mut self, transport: &T, result: Result<R>) -> Result<R> {
        self.last_reply = transport.last_reply().clone();
        if let Err(e) = &result {
            if e.is_fatal() {
                self.reset(e);
            }
        }
        result
    }

    fn reset(&mut self, cause: &dyn std::error::Error) {
        if self.connected || self.logged_in {
            counters::connection_reset();
            tracing::warn!(
                host = %self.credentials.host(),
                error = %cause,
                "connection lost, resetting"
            );
        }
        self.connected = false;
        self.logged_in = false;
        self.keep_alive.stop();
    }
}

impl<T: Transport> PartialEq for Connection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T: Transport> Eq for Connection<T> {}

impl<T: Transport> Hash for Connection<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("credentials", &self.credentials)
            .field("state", &self.state())
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}
