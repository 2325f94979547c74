//! Connection management
//!
//! This module handles:
//! * Credentials and per-connection options
//! * Connection lifecycle (connect, login, logout, disconnect)
//! * State machine enforcement and recovery from lost connections
//! * Background keep-alive
//! * Read-only remote queries

mod conn;
mod credentials;
mod keepalive;
mod lookup;
mod options;
mod paths;
mod state;

pub use conn::Connection;
pub use credentials::{ConnectionKey, Credentials};
pub use keepalive::KeepAliveDriver;
pub use lookup::{ModifiedTime, PathStats, RemoteLookup};
pub use options::ConnectionOptions;
pub use state::{ConnectionState, Transition};
