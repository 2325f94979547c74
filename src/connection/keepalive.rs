//! Periodic keep-alive
//!
//! While a connection is logged in, a background task sends `NOOP` every
//! interval so idle sessions are not dropped by the server. The task shares
//! the connection's transport mutex, so a keep-alive never interleaves with a
//! foreground command.

use crate::transport::{Transport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct Flags {
    running: bool,
    cancelled: bool,
    interval: Duration,
    // Closure already reported since the last acknowledged NOOP
    peer_closed: bool,
}

/// Background `NOOP` sender owned by a single [`Connection`](crate::Connection)
///
/// Cancellation is cooperative: [`stop`](Self::stop) raises a flag that the
/// task checks on its next tick, after acquiring the transport and before
/// sending. Dropping the driver aborts the task.
pub struct KeepAliveDriver<T: Transport> {
    transport: Arc<tokio::sync::Mutex<T>>,
    flags: Arc<Mutex<Flags>>,
    task: Option<JoinHandle<()>>,
}

impl<T: Transport> KeepAliveDriver<T> {
    /// Create a stopped driver
    pub fn new(transport: Arc<tokio::sync::Mutex<T>>, interval: Duration) -> Self {
        Self {
            transport,
            flags: Arc::new(Mutex::new(Flags {
                running: false,
                cancelled: false,
                interval,
                peer_closed: false,
            })),
            task: None,
        }
    }

    /// Start sending keep-alives
    ///
    /// Clears a pending [`stop`](Self::stop). Has no other effect while the
    /// task is still running.
    pub fn start(&mut self) {
        {
            let mut flags = self.flags.lock();
            flags.cancelled = false;
            flags.peer_closed = false;
            if flags.running {
                tracing::debug!("keep-alive already running");
                return;
            }
            flags.running = true;
        }

        if let Some(old) = self.task.take() {
            old.abort();
        }

        let transport = Arc::clone(&self.transport);
        let flags = Arc::clone(&self.flags);
        self.task = Some(tokio::spawn(run(transport, flags)));
        tracing::debug!("keep-alive started");
    }

    /// Request the task to halt on its next tick
    pub fn stop(&self) {
        self.flags.lock().cancelled = true;
        tracing::debug!("keep-alive stop requested");
    }

    /// Task is alive and has not yet observed a stop request
    pub fn is_running(&self) -> bool {
        self.flags.lock().running
    }

    /// Interval between keep-alives
    pub fn interval(&self) -> Duration {
        self.flags.lock().interval
    }

    /// Change the interval; takes effect after the current tick
    pub fn set_interval(&self, interval: Duration) {
        self.flags.lock().interval = interval;
    }
}

impl<T: Transport> Drop for KeepAliveDriver<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T: Transport> std::fmt::Debug for KeepAliveDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = self.flags.lock();
        f.debug_struct("KeepAliveDriver")
            .field("running", &flags.running)
            .field("cancelled", &flags.cancelled)
            .field("interval", &flags.interval)
            .finish()
    }
}

async fn run<T: Transport>(transport: Arc<tokio::sync::Mutex<T>>, flags: Arc<Mutex<Flags>>) {
    loop {
        let interval = flags.lock().interval;
        tokio::time::sleep(interval).await;

        let mut transport = transport.lock().await;
        {
            let mut flags = flags.lock();
            if flags.cancelled {
                flags.running = false;
                tracing::debug!("keep-alive stopped");
                return;
            }
        }

        match transport.noop().await {
            Ok(true) => {
                flags.lock().peer_closed = false;
                crate::metrics::counters::keepalive_sent();
                tracing::trace!("keep-alive sent");
            }
            Ok(false) => {
                crate::metrics::counters::keepalive_failed();
                tracing::warn!(reply = %transport.last_reply(), "keep-alive rejected");
            }
            Err(TransportError::ConnectionClosed) => {
                crate::metrics::counters::keepalive_failed();
                if std::mem::replace(&mut flags.lock().peer_closed, true) {
                    tracing::debug!("keep-alive skipped, control connection still closed");
                } else {
                    tracing::warn!("keep-alive found the control connection closed");
                }
            }
            Err(e) => {
                crate::metrics::counters::keepalive_failed();
                tracing::warn!(error = %e, "keep-alive failed");
            }
        }
    }
}
