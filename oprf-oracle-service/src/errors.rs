//! The fail-closed error taxonomy (spec §7): every handler returns
//! [`OracleError`] internally; the connection driver is the one place that
//! collapses any `Err` into the 6-byte fail sentinel, never leaking the
//! variant to the wire.

use oprf_oracle_types::FAIL_SENTINEL;

use crate::blob_store::BlobStoreError;
use crate::codec::CodecError;
use crate::metrics::METRICS_ID_BLOB_STORE_ERRORS;

/// All errors a record or challenge operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Wrong request length, trailing bytes, or an unparseable envelope.
    #[error("framing: {0}")]
    Framing(String),
    /// Bad signature, invalid OPRF input, or MAC mismatch.
    #[error("crypto: {0}")]
    Crypto(String),
    /// Record absent when required, present when forbidden, or a required
    /// scalar file (`new`/`old`) missing.
    #[error("state: {0}")]
    State(String),
    /// Challenge expired, PoW invalid, or an unknown `(n,k)` pair.
    #[error("rate limit: {0}")]
    RateLimit(String),
    /// Corrupted or unreadable blob storage.
    #[error(transparent)]
    Storage(BlobStoreError),
    /// The peer closed or the socket errored mid-protocol.
    #[error("connection: {0}")]
    Connection(#[from] std::io::Error),
}

impl From<BlobStoreError> for OracleError {
    fn from(value: BlobStoreError) -> Self {
        ::metrics::counter!(METRICS_ID_BLOB_STORE_ERRORS).increment(1);
        Self::Storage(value)
    }
}

impl From<CodecError> for OracleError {
    fn from(value: CodecError) -> Self {
        Self::Crypto(value.to_string())
    }
}

impl From<oprf_oracle_core::oprf::OprfError> for OracleError {
    fn from(value: oprf_oracle_core::oprf::OprfError) -> Self {
        Self::Crypto(value.to_string())
    }
}

impl From<oprf_oracle_types::WrappedRequestError> for OracleError {
    fn from(value: oprf_oracle_types::WrappedRequestError) -> Self {
        Self::Framing(value.to_string())
    }
}

impl From<oprf_oracle_types::UnknownOpcode> for OracleError {
    fn from(value: oprf_oracle_types::UnknownOpcode) -> Self {
        Self::Framing(value.to_string())
    }
}

impl From<crate::id_locks::IdLockedError> for OracleError {
    fn from(value: crate::id_locks::IdLockedError) -> Self {
        Self::State(value.to_string())
    }
}

impl OracleError {
    /// The one sanctioned representation of any error on the wire: the
    /// literal fail sentinel. Never branches on `self`'s variant — that
    /// would leak the taxonomy to the client (spec §7).
    pub fn into_sentinel(self) -> &'static [u8; 6] {
        tracing::debug!(error = %self, "request failed, sending fail sentinel");
        FAIL_SENTINEL
    }
}
