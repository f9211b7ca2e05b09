//! Signature-wrapped message envelope: `pubkey[32] ‖ payload[n] ‖ sig[64]`
//! (spec C2).

use oprf_oracle_core::signature;

/// Errors parsing or verifying an envelope.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The envelope is shorter than the fixed `pubkey ‖ sig` overhead.
    #[error("envelope too short: {0} bytes")]
    TooShort(usize),
    /// The detached signature did not verify.
    #[error(transparent)]
    BadSignature(#[from] signature::SignatureError),
}

/// Parses and verifies an envelope, returning the embedded payload.
///
/// Succeeds iff `sig` is a valid detached signature of `pubkey ‖ payload`
/// under `pk` — the caller-supplied expected key, which must match the
/// envelope's own embedded `pubkey` (this ties the signature to the
/// specific key the caller is authenticating against, preventing key
/// substitution: spec §4.2).
pub fn verify<'a>(envelope: &'a [u8], pk: &[u8; 32]) -> Result<&'a [u8], CodecError> {
    if envelope.len() < 32 + 64 {
        return Err(CodecError::TooShort(envelope.len()));
    }
    let (pubkey_and_payload, sig_bytes) = envelope.split_at(envelope.len() - 64);
    let embedded_pubkey: &[u8; 32] = pubkey_and_payload[..32]
        .try_into()
        .expect("length checked above");
    let payload = &pubkey_and_payload[32..];
    let sig: &[u8; 64] = sig_bytes.try_into().expect("length checked above");

    signature::verify(sig, pubkey_and_payload, embedded_pubkey)?;
    // Re-verifying under the embedded key alone would let an attacker swap
    // in their own keypair and a self-consistent envelope; binding to the
    // caller's expected `pk` is what makes this an authentication check.
    if embedded_pubkey != pk {
        return Err(CodecError::BadSignature(signature::SignatureError::Invalid));
    }
    Ok(payload)
}
