//! Metric names and label values

/// Commands sent on the control connection
pub const COMMANDS_SENT: &str = "ftp_conn_commands_sent_total";

/// Connection attempts by outcome
pub const CONNECT_ATTEMPTS: &str = "ftp_conn_connect_attempts_total";

/// Forced resets after an unexpected closure
pub const CONNECTION_RESETS: &str = "ftp_conn_connection_resets_total";

/// Keep-alive NOOPs by outcome
pub const KEEPALIVES: &str = "ftp_conn_keepalives_total";

/// Bytes moved per transfer
pub const TRANSFER_BYTES: &str = "ftp_conn_transfer_bytes";

/// Transfer wall time in milliseconds
pub const TRANSFER_DURATION_MS: &str = "ftp_conn_transfer_duration_ms";

/// Outcome label: success
pub const OUTCOME_OK: &str = "ok";
/// Outcome label: negative server reply
pub const OUTCOME_REFUSED: &str = "refused";
/// Outcome label: transport fault
pub const OUTCOME_FAILED: &str = "failed";
