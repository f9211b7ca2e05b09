//! Metrics definitions for the oracle service.
//!
//! This module defines all metrics keys used by the service and provides a
//! helper [`describe_metrics`] to set metadata for each metric using the
//! `metrics` crate.

/// Counts every request, labeled by opcode, entering the connection driver.
pub const METRICS_ID_REQUESTS_TOTAL: &str = "oprf_oracle.requests.total";
/// Counts requests that ended on the fail sentinel.
pub const METRICS_ID_REQUESTS_FAILED: &str = "oprf_oracle.requests.failed";
/// Gauge of connections currently being handled.
pub const METRICS_ID_CONNECTIONS_ACTIVE: &str = "oprf_oracle.connections.active";
/// Counts blob store errors (corrupted blob, I/O failure).
pub const METRICS_ID_BLOB_STORE_ERRORS: &str = "oprf_oracle.blob_store.errors";
/// Gauge of the most recently issued PoW difficulty level, labeled by id's
/// difficulty file (observed, not averaged, across issuances).
pub const METRICS_ID_CHALLENGE_LEVEL: &str = "oprf_oracle.challenge.level";
/// Counts PoW challenges that failed verification (MAC mismatch, expiry, or
/// a bad solution).
pub const METRICS_ID_CHALLENGE_REJECTED: &str = "oprf_oracle.challenge.rejected";

/// Describe all metrics used by the service.
///
/// This calls the `describe_*` functions from the `metrics` crate to set
/// metadata for each metric.
pub fn describe_metrics() {
    ::metrics::describe_counter!(
        METRICS_ID_REQUESTS_TOTAL,
        metrics::Unit::Count,
        "Number of requests handled by the connection driver, by opcode"
    );
    ::metrics::describe_counter!(
        METRICS_ID_REQUESTS_FAILED,
        metrics::Unit::Count,
        "Number of requests that ended on the fail sentinel"
    );
    ::metrics::describe_gauge!(
        METRICS_ID_CONNECTIONS_ACTIVE,
        metrics::Unit::Count,
        "Number of connections currently being handled"
    );
    ::metrics::describe_counter!(
        METRICS_ID_BLOB_STORE_ERRORS,
        metrics::Unit::Count,
        "Number of blob store I/O or corruption errors"
    );
    ::metrics::describe_gauge!(
        METRICS_ID_CHALLENGE_LEVEL,
        metrics::Unit::Count,
        "Most recently issued proof-of-work difficulty level"
    );
    ::metrics::describe_counter!(
        METRICS_ID_CHALLENGE_REJECTED,
        metrics::Unit::Count,
        "Number of proof-of-work challenges rejected at verification"
    );
}
