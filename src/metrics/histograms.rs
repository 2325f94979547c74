//! Histogram helpers

use super::labels;

/// Bytes moved by one transfer
pub fn transfer_bytes(direction: &'static str, bytes: u64) {
    metrics::histogram!(labels::TRANSFER_BYTES, "direction" => direction).record(bytes as f64);
}

/// Wall time of one transfer
pub fn transfer_duration(direction: &'static str, duration_ms: u64) {
    metrics::histogram!(labels::TRANSFER_DURATION_MS, "direction" => direction)
        .record(duration_ms as f64);
}
