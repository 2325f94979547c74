//! Connection registry
//!
//! [`ConnectionManager`] hands out shared connections keyed by full
//! credentials (password included) and drives them into the requested
//! [`ConnectionState`] with as few transitions as possible.

use crate::connection::{Connection, ConnectionOptions, ConnectionState, Credentials, Transition};
use crate::error::{Error, Result};
use crate::transport::{FtpClient, Transport};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;

/// Connection shared between the manager and its callers
pub type SharedConnection<T> = Arc<tokio::sync::Mutex<Connection<T>>>;

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

struct Entry<T: Transport> {
    credentials: Credentials,
    connection: SharedConnection<T>,
}

/// Registry of live connections
///
/// Not internally synchronized: mutation takes `&mut self`, so callers that
/// share a manager wrap it themselves.
///
/// # Example
///
/// ```no_run
/// # async fn example() {
/// use ftp_conn::{ConnectionManager, ConnectionOptions};
///
/// let mut manager = ConnectionManager::new(ConnectionOptions::default());
/// match manager
///     .create_ready_connection("ftp.example.com", "bob", "secret", 21)
///     .await
/// {
///     Some(conn) => {
///         let mut conn = conn.lock().await;
///         let _ = conn.list_files("/").await;
///     }
///     None => eprintln!("{:?}", manager.last_error()),
/// }
/// # }
/// ```
pub struct ConnectionManager<T: Transport> {
    entries: Vec<Entry<T>>,
    factory: Factory<T>,
    options: ConnectionOptions,
    last_error: Option<Error>,
}

impl ConnectionManager<FtpClient> {
    /// Manager creating TCP connections with `options`
    pub fn new(options: ConnectionOptions) -> Self {
        Self::with_factory(options, FtpClient::new)
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Manager creating connections over transports built by `factory`
    pub fn with_factory(
        options: ConnectionOptions,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            entries: Vec::new(),
            factory: Box::new(factory),
            options,
            last_error: None,
        }
    }

    /// Idle connection for these credentials
    ///
    /// `None` when a tracked connection could not be brought to idle; see
    /// [`last_error`](Self::last_error).
    pub async fn create_idle_connection(
        &mut self,
        host: &str,
        user: &str,
        password: &str,
        port: u16,
    ) -> Option<SharedConnection<T>> {
        self.create(Credentials::new(host, user, password, port), ConnectionState::Idle)
            .await
    }

    /// Connected, not logged in, connection for these credentials
    pub async fn create_connected_connection(
        &mut self,
        host: &str,
        user: &str,
        password: &str,
        port: u16,
    ) -> Option<SharedConnection<T>> {
        self.create(
            Credentials::new(host, user, password, port),
            ConnectionState::Connected,
        )
        .await
    }

    /// Logged-in connection for these credentials
    pub async fn create_ready_connection(
        &mut self,
        host: &str,
        user: &str,
        password: &str,
        port: u16,
    ) -> Option<SharedConnection<T>> {
        self.create(Credentials::new(host, user, password, port), ConnectionState::Ready)
            .await
    }

    async fn create(
        &mut self,
        credentials: Credentials,
        target: ConnectionState,
    ) -> Option<SharedConnection<T>> {
        self.last_error = None;

        if let Some(connection) = self.find(&credentials) {
            tracing::debug!(key = %credentials.identity(), %target, "reusing connection");
            return match Self::handle_connection(&connection, target).await {
                Ok(true) => Some(connection),
                Ok(false) => {
                    tracing::debug!(%target, "connection did not reach the requested state");
                    None
                }
                Err(e) => {
                    if e.is_fatal() {
                        tracing::info!(key = %credentials.identity(), "evicting failed connection");
                        self.entries
                            .retain(|entry| !Arc::ptr_eq(&entry.connection, &connection));
                    }
                    self.last_error = Some(e);
                    None
                }
            };
        }

        tracing::debug!(key = %credentials.identity(), %target, "creating connection");
        let connection = Connection::new((self.factory)(), credentials.clone(), self.options.clone());
        let connection = Arc::new(tokio::sync::Mutex::new(connection));

        match Self::handle_connection(&connection, target).await {
            Ok(true) => {
                self.entries.push(Entry {
                    credentials,
                    connection: Arc::clone(&connection),
                });
                Some(connection)
            }
            outcome => {
                let mut conn = connection.lock().await;
                if conn.is_connected() {
                    if let Err(e) = conn.disconnect().await {
                        tracing::debug!(error = %e, "closing abandoned connection failed");
                    }
                }
                if let Err(e) = outcome {
                    self.last_error = Some(e);
                }
                None
            }
        }
    }

    /// Drive `connection` into `target` and check that it got there
    ///
    /// Only the transitions between the current and the target state are
    /// performed. `Ok(false)` means every step ran without error yet the
    /// connection ended elsewhere, for example after a rejected login.
    pub async fn handle_connection(
        connection: &SharedConnection<T>,
        target: ConnectionState,
    ) -> Result<bool> {
        let mut conn = connection.lock().await;
        for step in conn.state().steps_to(target) {
            match step {
                Transition::Connect => {
                    conn.connect().await?;
                }
                Transition::Login => {
                    conn.login().await?;
                }
                Transition::Logout => {
                    conn.logout().await?;
                }
                Transition::Disconnect => conn.disconnect().await?,
            }
        }
        Ok(conn.state() == target)
    }

    /// Track an externally constructed connection
    ///
    /// Replaces a tracked connection with the same credentials.
    pub fn add_connection(&mut self, connection: Connection<T>) -> SharedConnection<T> {
        let credentials = connection.credentials().clone();
        let connection = Arc::new(tokio::sync::Mutex::new(connection));
        self.entries.retain(|entry| entry.credentials != credentials);
        self.entries.push(Entry {
            credentials,
            connection: Arc::clone(&connection),
        });
        connection
    }

    /// Tracked connection with exactly these credentials
    pub fn find(&self, credentials: &Credentials) -> Option<SharedConnection<T>> {
        self.entries
            .iter()
            .find(|entry| &entry.credentials == credentials)
            .map(|entry| Arc::clone(&entry.connection))
    }

    /// Stop tracking the connection with these credentials
    pub fn remove_connection(&mut self, credentials: &Credentials) -> Option<SharedConnection<T>> {
        let pos = self
            .entries
            .iter()
            .position(|entry| &entry.credentials == credentials)?;
        Some(self.entries.remove(pos).connection)
    }

    /// Error of the last create call that returned `None`
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Snapshot of the tracked connections
    pub fn connections(&self) -> Vec<SharedConnection<T>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(&entry.connection))
            .collect()
    }

    /// Number of tracked connections
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No tracked connections
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Disconnect and forget every tracked connection
    ///
    /// Connections are closed concurrently. Every connection is closed even
    /// when some fail; the first failure is returned.
    pub async fn disconnect_all(&mut self) -> Result<()> {
        let closing = self.entries.drain(..).map(|entry| async move {
            let mut conn = entry.connection.lock().await;
            if !conn.is_connected() {
                return Ok(());
            }
            conn.disconnect().await.map_err(|e| {
                tracing::warn!(key = %entry.credentials.identity(), error = %e, "disconnect failed");
                e
            })
        });

        join_all(closing).await.into_iter().collect()
    }
}

impl<T: Transport> fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field(
                "connections",
                &self
                    .entries
                    .iter()
                    .map(|entry| entry.credentials.identity())
                    .collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .field("last_error", &self.last_error)
            .finish()
    }
}
