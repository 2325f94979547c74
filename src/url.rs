//! FTP URL parsing
//!
//! Supports `ftp://[user[:password]@]host[:port][/path]`. Without a user the
//! anonymous account is used, with `<local user>@` as password.

use crate::connection::Credentials;
use crate::protocol::constants::DEFAULT_PORT;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Anonymous FTP user name
pub const ANONYMOUS_USER: &str = "anonymous";

/// Parsed FTP URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpUrl {
    /// Account to log in with
    pub credentials: Credentials,
    /// Initial remote directory (`/` when absent)
    pub path: String,
}

impl FtpUrl {
    /// Parse an FTP URL
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("ftp://")
            .ok_or_else(|| Error::Config("FTP URL must start with ftp://".into()))?;

        let (authority, path) = match rest.find('/') {
            Some(pos) => rest.split_at(pos),
            None => (rest, "/"),
        };

        // Passwords may contain '@'; the host never does
        let (auth, host_port) = match authority.rfind('@') {
            Some(pos) => (Some(&authority[..pos]), &authority[pos + 1..]),
            None => (None, authority),
        };

        let (user, password) = match auth {
            Some(auth) => match auth.split_once(':') {
                Some((user, pass)) => (user.to_string(), pass.to_string()),
                None => (auth.to_string(), String::new()),
            },
            None => (ANONYMOUS_USER.to_string(), anonymous_password()),
        };
        if user.is_empty() {
            return Err(Error::Config("empty user in FTP URL".into()));
        }

        let (host, port) = split_host_port(host_port)?;
        if host.is_empty() {
            return Err(Error::Config("missing host in FTP URL".into()));
        }

        Ok(Self {
            credentials: Credentials::new(host, user, password, port),
            path: path.to_string(),
        })
    }

    /// Account uses the anonymous login
    pub fn is_anonymous(&self) -> bool {
        self.credentials.user().eq_ignore_ascii_case(ANONYMOUS_USER)
    }
}

/// `<local user>@`, the conventional anonymous password
pub fn anonymous_password() -> String {
    format!("{}@", whoami::username())
}

fn split_host_port(host_port: &str) -> Result<(&str, u16)> {
    // Bracketed IPv6 literal
    if let Some(rest) = host_port.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config("unterminated IPv6 address".into()))?;
        let port = match after.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if after.is_empty() => DEFAULT_PORT,
            None => return Err(Error::Config("invalid text after IPv6 address".into())),
        };
        return Ok((host, port));
    }

    match host_port.split_once(':') {
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((host_port, DEFAULT_PORT)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::Config(format!("invalid port: {}", port))),
        Ok(port) => Ok(port),
    }
}

impl FromStr for FtpUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FtpUrl {
    /// Formats without the password
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = self.credentials.host();
        write!(f, "ftp://{}@", self.credentials.user())?;
        if host.contains(':') {
            write!(f, "[{}]", host)?;
        } else {
            write!(f, "{}", host)?;
        }
        if self.credentials.port() != DEFAULT_PORT {
            write!(f, ":{}", self.credentials.port())?;
        }
        write!(f, "{}", self.path)
    }
}
