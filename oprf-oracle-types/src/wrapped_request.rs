//! The "wrapped request" framing shared by the challenge issuer (§4.6) and
//! verifier (§4.7): the request the client intends to execute once it has
//! paid its proof-of-work, carried verbatim through the PoW round-trip.

use crate::opcode::{RecordOp, UnknownOpcode};
use crate::record_id::RecordId;

/// A parsed wrapped request: `op[1] ‖ id[32]` and, for every op but READ,
/// `alpha[32]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedRequest {
    /// The exact bytes as received — this, not a re-serialization, is what
    /// gets MAC-sealed and re-verified (spec §4.6 step 7 / §4.7 step 4).
    bytes: Vec<u8>,
    op: RecordOp,
    id: RecordId,
}

/// Errors framing a wrapped request.
#[derive(Debug, thiserror::Error)]
pub enum WrappedRequestError {
    /// The buffer was empty.
    #[error("empty wrapped request")]
    Empty,
    /// The leading byte does not name a record operation.
    #[error(transparent)]
    UnknownOp(#[from] UnknownOpcode),
    /// The buffer length doesn't match the 33-or-65 discipline for its opcode.
    #[error("wrapped request for {op} must be {expected} bytes, got {actual}")]
    WrongLength {
        /// The op whose framing was violated.
        op: RecordOp,
        /// The length this op requires.
        expected: usize,
        /// The length actually supplied.
        actual: usize,
    },
}

impl WrappedRequest {
    /// Parses `bytes` per the 33-or-65 discipline: `op[1] ‖ id[32]` alone for
    /// READ, otherwise `op[1] ‖ id[32] ‖ alpha[32]`. Trailing bytes make the
    /// request invalid.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, WrappedRequestError> {
        let &first = bytes.first().ok_or(WrappedRequestError::Empty)?;
        let op = RecordOp::try_from(first)?;
        let expected = if op.is_short_form() { 33 } else { 65 };
        if bytes.len() != expected {
            return Err(WrappedRequestError::WrongLength {
                op,
                expected,
                actual: bytes.len(),
            });
        }
        let mut id_bytes = [0u8; 32];
        id_bytes.copy_from_slice(&bytes[1..33]);
        Ok(Self {
            bytes,
            op,
            id: RecordId::from_bytes(id_bytes),
        })
    }

    /// The record operation this request wants dispatched.
    pub fn op(&self) -> RecordOp {
        self.op
    }

    /// The target record id.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// `alpha`, the OPRF blinded element, if this op carries one.
    pub fn alpha(&self) -> Option<&[u8; 32]> {
        if self.op.is_short_form() {
            None
        } else {
            Some(self.bytes[33..65].try_into().expect("length checked in parse"))
        }
    }

    /// The exact bytes this request was parsed from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_form_read() {
        let mut buf = vec![RecordOp::READ];
        buf.extend_from_slice(&[0x11; 32]);
        let req = WrappedRequest::parse(buf).unwrap();
        assert_eq!(req.op(), RecordOp::Read);
        assert!(req.alpha().is_none());
    }

    #[test]
    fn parses_long_form_get() {
        let mut buf = vec![RecordOp::GET];
        buf.extend_from_slice(&[0x22; 32]);
        buf.extend_from_slice(&[0x33; 32]);
        let req = WrappedRequest::parse(buf).unwrap();
        assert_eq!(req.op(), RecordOp::Get);
        assert_eq!(req.alpha().unwrap(), &[0x33; 32]);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut buf = vec![RecordOp::READ];
        buf.extend_from_slice(&[0x11; 33]);
        assert!(WrappedRequest::parse(buf).is_err());
    }

    #[test]
    fn rejects_unknown_op() {
        let buf = vec![0x01; 65];
        assert!(WrappedRequest::parse(buf).is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            WrappedRequest::parse(vec![]),
            Err(WrappedRequestError::Empty)
        ));
    }
}
