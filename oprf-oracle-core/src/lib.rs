//! Pure cryptographic adapters backing the OPRF password-derivation oracle.
//!
//! This crate has no notion of records, connections, or rate limiting — it
//! is the small set of deterministic functions the service layer calls out
//! to: the OPRF responder, detached-signature verification, challenge MAC
//! sealing, and Equihash proof-of-work verification. Keeping these isolated
//! means the service layer's tests can stub them out where the protocol
//! dance, not the crypto, is under test.

pub mod mac;
pub mod oprf;
pub mod pow;
pub mod signature;
