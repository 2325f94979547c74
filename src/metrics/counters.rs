//! Counter helpers

use super::labels;

/// A command was written to the control connection
pub fn command_sent(verb: &'static str) {
    metrics::counter!(labels::COMMANDS_SENT, "command" => verb).increment(1);
}

/// A `connect()` attempt finished with `outcome`
pub fn connect_attempt(outcome: &'static str) {
    metrics::counter!(labels::CONNECT_ATTEMPTS, "outcome" => outcome).increment(1);
}

/// Connection state was forcibly reset after an unexpected closure
pub fn connection_reset() {
    metrics::counter!(labels::CONNECTION_RESETS).increment(1);
}

/// Keep-alive NOOP sent and acknowledged
pub fn keepalive_sent() {
    metrics::counter!(labels::KEEPALIVES, "outcome" => labels::OUTCOME_OK).increment(1);
}

/// Keep-alive NOOP failed or was refused
pub fn keepalive_failed() {
    metrics::counter!(labels::KEEPALIVES, "outcome" => labels::OUTCOME_FAILED).increment(1);
}
