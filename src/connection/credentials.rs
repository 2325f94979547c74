//! Login credentials

use crate::protocol::constants::DEFAULT_PORT;
use std::fmt;

/// Host, user, password and port of an FTP account
///
/// Full equality compares all four fields. [`Credentials::identity`] leaves
/// the password out and is what a [`Connection`](crate::Connection) is
/// identified by.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    host: String,
    user: String,
    password: String,
    port: u16,
}

/// Password-free identity of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    /// Server host
    pub host: String,
    /// User name
    pub user: String,
    /// Server port
    pub port: u16,
}

impl Credentials {
    /// Create credentials
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            port,
        }
    }

    /// Server host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// User name
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Password
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Copy with a different host
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..self.clone()
        }
    }

    /// Copy with a different user
    pub fn with_user(&self, user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..self.clone()
        }
    }

    /// Copy with a different password
    pub fn with_password(&self, password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            ..self.clone()
        }
    }

    /// Copy with a different port
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }

    /// Identity without the password
    pub fn identity(&self) -> ConnectionKey {
        ConnectionKey {
            host: self.host.clone(),
            user: self.user.clone(),
            port: self.port,
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("", "", "", DEFAULT_PORT)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}
