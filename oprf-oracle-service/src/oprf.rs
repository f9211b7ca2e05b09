//! Thin wrapper over the OPRF responder adapter (spec C5): maps the pure
//! crypto error into [`OracleError`] without disclosing which of the two
//! (invalid element vs. something else) occurred to the client.

use oprf_oracle_core::oprf::{self, OprfScalar};

use crate::errors::OracleError;

/// Computes `beta = alpha^k`, collapsing any failure to fail-closed.
pub fn respond(alpha: &[u8; 32], k: &OprfScalar) -> Result<[u8; 32], OracleError> {
    oprf::respond(alpha, k).map_err(OracleError::from)
}
