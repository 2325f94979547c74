//! Connection options

use crate::protocol::constants::{DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS};
use crate::transport::Timeouts;
use serde::Deserialize;
use std::time::Duration;

/// Per-connection tuning
///
/// Zero values mean "use the default". Options are applied by
/// [`Connection::set_options`](crate::Connection::set_options), which has no
/// effect while connected.
///
/// # Examples
///
/// ```
/// use ftp_conn::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_timeout_seconds(30)
///     .with_keep_alive(false);
/// assert_eq!(options.timeout_seconds(), 30);
/// assert_eq!(options.page_size(), 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    timeout_seconds: u32,
    page_size: usize,
    keep_alive: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            keep_alive: true,
        }
    }
}

impl ConnectionOptions {
    /// Set the timeout in seconds (0 restores the default)
    pub fn with_timeout_seconds(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the listing page size (0 restores the default)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enable or disable the keep-alive driver
    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    /// Timeout in seconds, normalized
    pub fn timeout_seconds(&self) -> u32 {
        normalize_timeout(self.timeout_seconds)
    }

    /// Timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds()))
    }

    /// Entries per listing page, normalized
    pub fn page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Whether the keep-alive driver runs while logged in
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Transport timeouts derived from these options
    pub fn timeouts(&self) -> Timeouts {
        Timeouts::uniform(self.timeout())
    }
}

pub(crate) fn normalize_timeout(seconds: u32) -> u32 {
    if seconds == 0 {
        DEFAULT_TIMEOUT_SECS
    } else {
        seconds
    }
}
